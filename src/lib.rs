//! Host side of the VEX Debug Protocol (VDP).
//!
//! A robot program describes its telemetry as a tree of named, typed values
//! and advertises it on a numbered channel. The host learns the schema from
//! that broadcast and from then on decodes compact data messages that carry
//! only the values. Packets travel COBS framed over a serial line.

pub mod cobs;
pub mod crc32;
pub mod devices;
pub mod errors;
pub mod protocol;
pub mod registry;
pub mod types;

pub use registry::{Channel, ChannelID, Event, Registry, RegistryConfig};
pub use types::{Part, Type};
