use crate::crc32;
use crate::errors::EncodeError;
use crate::registry::ChannelID;
use crate::types::{Part, Type};

use super::{make_header_byte, PacketFunction, PacketHeader, PacketType, WireNumber};

/// An append-only write cursor over a scratch buffer.
///
/// The high level `write_channel_*` functions clear the buffer first and
/// always finish the packet with the CRC32 of everything before it.
#[derive(Debug)]
pub struct PacketWriter<'a> {
    sofar: &'a mut Vec<u8>,
}

impl<'a> PacketWriter<'a> {
    /// Creates a writer that appends to `scratch`
    pub fn new(scratch: &'a mut Vec<u8>) -> Self {
        Self { sofar: scratch }
    }

    pub fn clear(&mut self) {
        self.sofar.clear();
    }

    pub fn len(&self) -> usize {
        self.sofar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sofar.is_empty()
    }

    /// The packet written so far
    pub fn get_packet(&self) -> &[u8] {
        self.sofar.as_slice()
    }

    pub fn write_byte(&mut self, b: u8) {
        self.sofar.push(b);
    }

    /// Writes a one byte type tag
    pub fn write_type(&mut self, t: Type) {
        self.write_byte(t as u8);
    }

    /// Writes a string followed by its zero terminator
    pub fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        // The terminator is the only thing marking where the string ends,
        // so the string itself can not contain one
        if s.as_bytes().contains(&0) {
            return Err(EncodeError::EmbeddedNul(s.to_string()));
        }

        self.sofar.extend_from_slice(s.as_bytes());
        self.sofar.push(0);
        Ok(())
    }

    /// Writes a fixed width little-endian number
    pub fn write_number<T: WireNumber>(&mut self, num: T) {
        num.write_le(self.sofar);
    }

    /// Writes the header byte and channel id that start every packet
    fn write_preamble(&mut self, packet_type: PacketType, function: PacketFunction, id: ChannelID) {
        self.clear();
        self.write_number::<u8>(make_header_byte(PacketHeader::new(packet_type, function)));
        self.write_number::<ChannelID>(id);
    }

    /// Seals the packet with the checksum of everything written so far
    fn write_checksum(&mut self) {
        let crc = crc32::calculate(self.sofar.as_slice());
        self.write_number::<u32>(crc);
    }

    /// Writes a packet advertising the schema of `schema`
    pub fn write_channel_broadcast(&mut self, id: ChannelID, schema: &Part) -> Result<(), EncodeError> {
        self.write_preamble(PacketType::Broadcast, PacketFunction::Send, id);

        // Schema
        if let Err(e) = schema.write_schema(self) {
            self.clear();
            return Err(e);
        }

        self.write_checksum();
        Ok(())
    }

    /// Writes a packet acknowledging the broadcast of channel `id`
    pub fn write_channel_acknowledge(&mut self, id: ChannelID) {
        self.write_preamble(PacketType::Broadcast, PacketFunction::Acknowledge, id);
        self.write_checksum();
    }

    /// Writes a packet carrying the current values of `data`
    pub fn write_data_message(&mut self, id: ChannelID, data: &Part) -> Result<(), EncodeError> {
        self.write_preamble(PacketType::Data, PacketFunction::Send, id);

        // Data
        if let Err(e) = data.write_message(self) {
            self.clear();
            return Err(e);
        }

        self.write_checksum();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{validate_packet, PacketValidity};

    #[test]
    fn test_write_primitives() {
        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);

        writer.write_byte(0xAB);
        writer.write_type(Type::Int32);
        writer.write_string("rpm").unwrap();
        writer.write_number::<i32>(-2);
        writer.write_number::<f32>(1.0);

        assert_eq!(
            writer.get_packet(),
            &[0xAB, 11, b'r', b'p', b'm', 0, 0xFE, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x3F]
        );
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        assert_eq!(
            writer.write_string("a\0b"),
            Err(EncodeError::EmbeddedNul("a\0b".to_string()))
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn test_acknowledge_layout() {
        let mut scratch = vec![1, 2, 3];
        let mut writer = PacketWriter::new(&mut scratch);
        writer.write_channel_acknowledge(9);

        let packet = writer.get_packet();
        assert_eq!(packet.len(), 6);
        assert_eq!(packet[0], 0b0100_0000);
        assert_eq!(packet[1], 9);
        assert_eq!(
            &packet[2..],
            &crc32::calculate(&[0b0100_0000, 9]).to_le_bytes()
        );
        assert_eq!(validate_packet(packet), PacketValidity::Ok);
    }

    #[test]
    fn test_broadcast_layout() {
        let part = Part::record("motor", vec![Part::int32("rpm"), Part::string("state")]);

        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        writer.write_channel_broadcast(7, &part).unwrap();

        let packet = writer.get_packet();
        let body = &packet[..packet.len() - 4];
        assert_eq!(
            body,
            &[
                0x00, 7, // header, channel
                0, b'm', b'o', b't', b'o', b'r', 0, 2, 0, 0, 0, // record
                11, b'r', b'p', b'm', 0, // int32
                1, b's', b't', b'a', b't', b'e', 0, // string
            ]
        );
        assert_eq!(validate_packet(packet), PacketValidity::Ok);
    }

    #[test]
    fn test_data_layout() {
        let mut part = Part::record("motor", vec![Part::int32("rpm"), Part::string("state")]);
        part.field_mut("rpm").unwrap().set_value(1500i32);
        part.field_mut("state").unwrap().set_string("ok");

        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        writer.write_data_message(7, &part).unwrap();

        let packet = writer.get_packet();
        assert_eq!(
            &packet[..packet.len() - 4],
            &[0x80, 7, 0xDC, 0x05, 0, 0, b'o', b'k', 0]
        );
        assert_eq!(validate_packet(packet), PacketValidity::Ok);
    }

    #[test]
    fn test_failed_encode_leaves_empty_buffer() {
        let mut part = Part::string("state");
        part.set_string("bad\0value");

        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        assert!(writer.write_data_message(1, &part).is_err());
        assert!(writer.is_empty());
    }
}
