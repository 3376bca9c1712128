//! Consistent Overhead Byte Stuffing.
//!
//! Every packet is COBS encoded before it is written to the serial line, so
//! that `0x00` never appears inside a frame and can be used to mark where one
//! frame ends and the next begins. An encoded frame looks like:
//! ```text
//! ┌──────┬──────┬─────────────┬──────┬─────┬──────┐
//! │ 0x00 │ CODE │ 1-254 BYTES │ CODE │ ... │ 0x00 │
//! └──────┴──────┴─────────────┴──────┴─────┴──────┘
//! ```
//! Each CODE byte is the offset to the next (removed) zero.

use tracing::warn;

/// The byte that separates frames on the wire
pub const DELIMITER: u8 = 0x00;

/// The code byte of a group holding the maximum of 254 non-zero bytes
const FULL_GROUP: u8 = 0xFF;

/// The largest frame the [`Framer`] will buffer before giving up on it
pub const MAX_FRAME_SIZE: usize = 4096;

/// Encodes `input` into a delimited frame.
///
/// The empty input encodes to an empty output, not to a bare delimiter.
pub fn encode(input: &[u8]) -> Vec<u8> {
    if input.is_empty() {
        return Vec::new();
    }

    let body = ::cobs::encode_vec(input);
    let body = trim_empty_group(&body);

    let mut output = Vec::with_capacity(body.len() + 2);
    output.push(DELIMITER);
    output.extend_from_slice(body);
    output.push(DELIMITER);
    output
}

/// Drops the empty group that follows a full group at the very end of the input
fn trim_empty_group(body: &[u8]) -> &[u8] {
    let mut previous = None;
    let mut last = None;
    let mut i = 0;
    while i < body.len() {
        previous = last;
        last = Some(i);
        i += body[i].max(1) as usize;
    }

    match (previous, last) {
        (Some(p), Some(l)) if body[p] == FULL_GROUP && body[l] == 1 && l + 1 == body.len() => &body[..l],
        _ => body,
    }
}

/// Decodes one frame.
///
/// The leading delimiter is optional. Decoding stops at the first delimiter
/// or at the end of `input`, whichever comes first. Malformed input is never
/// an error: decoding simply stops and whatever was reconstructed so far is
/// returned. The packet checksum is what catches the damage.
pub fn decode(input: &[u8]) -> Vec<u8> {
    let body = input.strip_prefix(&[DELIMITER]).unwrap_or(input);

    // Decoded data is never longer than the encoded frame
    let mut output = vec![0; body.len()];
    let mut decoder = ::cobs::CobsDecoder::new(&mut output);

    // A frame without a trailing delimiter is terminated here
    let mut written = 0;
    for &byte in body.iter().chain(std::iter::once(&DELIMITER)) {
        match decoder.feed(byte) {
            Ok(None) => continue,
            Ok(Some(n)) | Err(n) => {
                written = n;
                break;
            }
        }
    }

    output.truncate(written);
    output
}

/// Splits a raw byte stream into frames.
///
/// Bytes are pushed in as they arrive from the transport; each complete
/// frame is handed back without its delimiters, ready for [`decode`].
#[derive(Debug, Clone)]
pub struct Framer {
    buffer: Vec<u8>,
    max_frame_size: usize,
    overflowed: bool,
    dropped: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Framer {
    /// Creates a framer that discards any frame longer than `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
            overflowed: false,
            dropped: 0,
        }
    }

    /// Feeds bytes into the framer, returning every frame they completed
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == DELIMITER {
                if self.overflowed {
                    // The tail of an overlong frame, resynchronize here
                    self.overflowed = false;
                } else if !self.buffer.is_empty() {
                    frames.push(std::mem::take(&mut self.buffer));
                }
                self.buffer.clear();
                continue;
            }

            if self.overflowed {
                continue;
            }

            if self.buffer.len() >= self.max_frame_size {
                warn!(
                    max_frame_size = self.max_frame_size,
                    "Discarding frame that is too long"
                );
                self.overflowed = true;
                self.dropped += 1;
                self.buffer.clear();
                continue;
            }

            self.buffer.push(byte);
        }

        frames
    }

    /// The number of overlong frames thrown away so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Forgets any partially received frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}
