//! The first byte of every packet.
//!
//! ```text
//!   7      6      5 ... 0
//! ┌──────┬──────┬──────────┐
//! │ TYPE │ FUNC │ reserved │
//! └──────┴──────┴──────────┘
//! ```
//! The reserved bits are written as zero and ignored when decoding.

use bitflags::bitflags;

bitflags! {
    /// The bits of the header byte that carry meaning.
    struct HeaderBits: u8 {
        const DATA = 0b1000_0000;
        const ACKNOWLEDGE = 0b0100_0000;
    }
}

/// What a packet carries
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// A channel schema advertisement
    Broadcast = 0,
    /// Values for a channel whose schema is already known
    Data = 1,
}

/// What the sender wants done with a packet
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketFunction {
    Send = 0,
    Acknowledge = 1,
}

/// A decoded header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub function: PacketFunction,
}

impl PacketHeader {
    pub fn new(packet_type: PacketType, function: PacketFunction) -> Self {
        Self {
            packet_type,
            function,
        }
    }
}

/// Packs a header into its wire byte
pub fn make_header_byte(header: PacketHeader) -> u8 {
    let mut bits = HeaderBits::empty();
    bits.set(HeaderBits::DATA, header.packet_type == PacketType::Data);
    bits.set(
        HeaderBits::ACKNOWLEDGE,
        header.function == PacketFunction::Acknowledge,
    );
    bits.bits()
}

/// Unpacks a wire byte into a header
pub fn decode_header_byte(byte: u8) -> PacketHeader {
    let bits = HeaderBits::from_bits_truncate(byte);

    let packet_type = if bits.contains(HeaderBits::DATA) {
        PacketType::Data
    } else {
        PacketType::Broadcast
    };
    let function = if bits.contains(HeaderBits::ACKNOWLEDGE) {
        PacketFunction::Acknowledge
    } else {
        PacketFunction::Send
    };

    PacketHeader::new(packet_type, function)
}
