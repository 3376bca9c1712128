use thiserror::Error;

use crate::protocol::{PacketHeader, PacketValidity};
use crate::registry::ChannelID;

/// Errors raised while reading a packet or a schema/data tree out of one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Reading {wanted} byte(s) at position {position} would read past a buffer of size {size}")]
    OutOfBounds {
        wanted: usize,
        position: usize,
        size: usize,
    },
    #[error("Unknown type tag {0:#04x}")]
    UnknownType(u8),
    #[error("Schema nesting is deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} byte(s) left over after decoding the payload")]
    TrailingBytes(usize),
    #[error("Invalid packet: {0:?}")]
    Invalid(PacketValidity),
    #[error("Unexpected packet header {0:?}")]
    UnexpectedHeader(PacketHeader),
}

/// Errors raised while writing a schema/data tree into a packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("String \"{0}\" contains a NUL byte and cannot be sent")]
    EmbeddedNul(String),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO Error")]
    IoError(#[from] std::io::Error),
    #[error("Serialport Error")]
    SerialportError(#[from] serialport::Error),
    #[error("Transmit queue is full")]
    QueueFull,
    #[error("Encoded frame of {0} byte(s) is longer than the peer will accept")]
    FrameTooLarge(usize),
    #[error("Device is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Decode Error")]
    DecodeError(#[from] DecodeError),
    #[error("Encode Error")]
    EncodeError(#[from] EncodeError),
    #[error("Device Error")]
    DeviceError(#[from] DeviceError),
    #[error("No channel with id {0} is known")]
    UnknownChannel(ChannelID),
    #[error("All {0} channel ids are already in use")]
    TooManyChannels(usize),
    #[error("Tree does not match the schema learned for channel {0}")]
    SchemaMismatch(ChannelID),
}
