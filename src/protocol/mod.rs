//! The VDP packet format.
//!
//! Every packet has the same outline:
//! ```text
//! ┌────────┬─────────┬─────────────────┬──────────┐
//! │ HEADER │ CHANNEL │ PAYLOAD         │ CRC32    │
//! │ 1B     │ 1B      │ schema / data   │ 4B (LE)  │
//! └────────┴─────────┴─────────────────┴──────────┘
//! ```
//! All multi-byte numbers on the wire are little-endian.

use std::fmt::Write;

use crate::crc32;
use crate::errors::DecodeError;
use crate::registry::ChannelID;
use crate::types::{make_decoder, Part};

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{decode_header_byte, make_header_byte, PacketFunction, PacketHeader, PacketType};
pub use reader::PacketReader;
pub use writer::PacketWriter;

/// An unframed packet
pub type Packet = Vec<u8>;

/// Size of the trailing checksum
pub const CHECKSUM_SIZE: usize = 4;

/// A header byte plus the checksum
pub const MIN_PACKET_SIZE: usize = 1 + CHECKSUM_SIZE;

/// The outcome of checking a received packet before decoding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketValidity {
    Ok,
    BadChecksum,
    TooSmall,
}

/// Checks the size and checksum of a received packet.
///
/// Nothing in a packet should be decoded unless this returns
/// [`PacketValidity::Ok`].
pub fn validate_packet(packet: &[u8]) -> PacketValidity {
    if packet.len() < MIN_PACKET_SIZE {
        return PacketValidity::TooSmall;
    }

    let (body, trailer) = packet.split_at(packet.len() - CHECKSUM_SIZE);
    let calculated = crc32::calculate(body);

    // Reassemble the written checksum, least significant byte first
    let written = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

    if calculated != written {
        tracing::warn!("Checksums do not match: expected: {calculated:08x}, got: {written:08x}");
        return PacketValidity::BadChecksum;
    }

    PacketValidity::Ok
}

/// Decodes the channel id and schema of a broadcast packet.
///
/// The packet is validated first. Anything other than a `(Broadcast, Send)`
/// header is rejected, and so is a schema that leaves bytes unread.
pub fn decode_broadcast(packet: &[u8]) -> Result<(ChannelID, Part), DecodeError> {
    match validate_packet(packet) {
        PacketValidity::Ok => {}
        invalid => return Err(DecodeError::Invalid(invalid)),
    }

    let mut reader = PacketReader::new(&packet[..packet.len() - CHECKSUM_SIZE]);

    let header = decode_header_byte(reader.get_byte()?);
    if header != PacketHeader::new(PacketType::Broadcast, PacketFunction::Send) {
        return Err(DecodeError::UnexpectedHeader(header));
    }

    let id = reader.get_number::<ChannelID>()?;
    let schema = make_decoder(&mut reader)?;
    ensure_consumed(&reader)?;

    Ok((id, schema))
}

/// Rejects a payload that did not use every byte before the checksum
pub(crate) fn ensure_consumed(reader: &PacketReader) -> Result<(), DecodeError> {
    match reader.remaining() {
        0 => Ok(()),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Formats a packet as rows of 16 hex bytes for logging
pub fn dump_packet(packet: &[u8]) -> String {
    let mut out = String::with_capacity(packet.len() * 3);
    for (i, chunk) in packet.chunks(16).enumerate() {
        if i != 0 {
            out.push('\n');
        }
        for (j, byte) in chunk.iter().enumerate() {
            if j != 0 {
                out.push(' ');
            }
            // Writing to a String can not fail
            let _ = write!(out, "{byte:02x}");
        }
    }
    out
}

/// A number with a fixed width little-endian wire representation
pub trait WireNumber: Copy {
    /// Width on the wire in bytes
    const SIZE: usize;

    /// Appends the little-endian bytes of `self`
    fn write_le(self, out: &mut Vec<u8>);

    /// Reads a value from exactly [`WireNumber::SIZE`] bytes
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_wire_number {
    ($($t:ty),*) => {
        $(
            impl WireNumber for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_wire_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);
