//! The CRC32 used to seal every packet.

use crc::{Algorithm, Crc};

/// VDP uses the common CRC-32 (ISO-HDLC, the one zlib and ethernet use).
pub const VDP_CRC32: Algorithm<u32> = crc::CRC_32_ISO_HDLC;

const CRC: Crc<u32> = Crc::<u32>::new(&VDP_CRC32);

/// Calculates the checksum of `bytes`.
pub fn calculate(bytes: &[u8]) -> u32 {
    CRC.checksum(bytes)
}
