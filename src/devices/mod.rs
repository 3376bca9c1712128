//! Transports that carry VDP packets.
//!
//! A [`Device`] moves whole, unframed packets. Framing (COBS) is the
//! device's business, the registry only ever sees complete packets.

use crate::errors::DeviceError;

pub mod memory;
pub mod ports;
pub mod serial;

pub use memory::MemoryDevice;
pub use serial::{SerialConfig, SerialDevice};

/// The default baud rate of the debug board link
pub const DEFAULT_BAUD_RATE: u32 = 115200 * 2;

/// The default timeout for a serial connection in seconds
pub const SERIAL_TIMEOUT_SECONDS: u64 = 3;

/// The default timeout for a serial connection in nanoseconds
pub const SERIAL_TIMEOUT_NS: u32 = 0;

/// Called once for every complete packet a device receives
pub type ReceiveCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// A link that can send packets and report the ones it receives
pub trait Device: Send + Sync {
    /// Queues one packet for sending. The packet must not be framed yet.
    fn send_packet(&self, packet: &[u8]) -> Result<(), DeviceError>;

    /// Replaces the function called with each received packet
    fn register_receive_callback(&self, callback: ReceiveCallback);
}
