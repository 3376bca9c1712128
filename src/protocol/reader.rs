use crate::errors::DecodeError;
use crate::types::Type;

use super::WireNumber;

/// A read cursor over a received packet.
///
/// Every read is bounds checked. A read that would run past the end of the
/// packet fails with [`DecodeError::OutOfBounds`] and leaves the cursor where
/// it was.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    packet: &'a [u8],
    read_head: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader positioned at the start of `packet`
    pub fn new(packet: &'a [u8]) -> Self {
        Self::with_offset(packet, 0)
    }

    /// Creates a reader positioned at `start`
    pub fn with_offset(packet: &'a [u8], start: usize) -> Self {
        Self {
            packet,
            read_head: start,
        }
    }

    /// The current position of the cursor
    pub fn position(&self) -> usize {
        self.read_head
    }

    /// How many bytes are left to read
    pub fn remaining(&self) -> usize {
        self.packet.len().saturating_sub(self.read_head)
    }

    /// Consumes the next `n` bytes
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::OutOfBounds {
                wanted: n,
                position: self.read_head,
                size: self.packet.len(),
            });
        }

        let bytes = &self.packet[self.read_head..self.read_head + n];
        self.read_head += n;
        Ok(bytes)
    }

    pub fn get_byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a one byte type tag
    pub fn get_type(&mut self) -> Result<Type, DecodeError> {
        let start = self.read_head;
        let tag = self.get_byte()?;
        Type::try_from(tag).map_err(|e| {
            self.read_head = start;
            e
        })
    }

    /// Reads a zero terminated string, consuming the terminator.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub fn get_string(&mut self) -> Result<String, DecodeError> {
        let rest = &self.packet[self.read_head.min(self.packet.len())..];

        // Find the terminator, if it is missing the string runs off the end
        let length = match rest.iter().position(|&b| b == 0) {
            Some(length) => length,
            None => {
                return Err(DecodeError::OutOfBounds {
                    wanted: rest.len() + 1,
                    position: self.read_head,
                    size: self.packet.len(),
                })
            }
        };

        let bytes = self.take(length + 1)?;
        Ok(String::from_utf8_lossy(&bytes[..length]).into_owned())
    }

    /// Reads a fixed width little-endian number
    pub fn get_number<T: WireNumber>(&mut self) -> Result<T, DecodeError> {
        let bytes = self.take(T::SIZE)?;
        Ok(T::from_le_slice(bytes))
    }
}
