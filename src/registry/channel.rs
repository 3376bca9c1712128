use crate::errors::EncodeError;
use crate::protocol::PacketWriter;
use crate::types::Part;

use super::ChannelID;

/// A stream of structured values, identified by a one byte id.
///
/// # Members
///
/// * `id` - The id shared by both ends of the link
/// * `data` - The schema and the latest values of the channel
/// * `acked` - Whether the peer acknowledged our broadcast of this channel
/// * `packet_scratch_space` - Reused buffer for packets written from this channel
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelID,
    data: Part,
    acked: bool,
    packet_scratch_space: Vec<u8>,
}

impl Channel {
    pub fn new(id: ChannelID, data: Part) -> Self {
        Self {
            id,
            data,
            acked: false,
            packet_scratch_space: Vec::new(),
        }
    }

    pub fn id(&self) -> ChannelID {
        self.id
    }

    pub fn data(&self) -> &Part {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Part {
        &mut self.data
    }

    pub(crate) fn into_data(self) -> Part {
        self.data
    }

    pub fn is_acked(&self) -> bool {
        self.acked
    }

    pub(crate) fn set_acked(&mut self, acked: bool) {
        self.acked = acked;
    }

    /// Refreshes every leaf from its fetcher
    pub fn fetch(&mut self) {
        self.data.fetch();
    }

    /// Writes a broadcast of this channel's schema into the scratch buffer
    pub fn broadcast_packet(&mut self) -> Result<&[u8], EncodeError> {
        let mut writer = PacketWriter::new(&mut self.packet_scratch_space);
        writer.write_channel_broadcast(self.id, &self.data)?;
        Ok(&self.packet_scratch_space)
    }

    /// Writes a data message with this channel's current values into the scratch buffer
    pub fn data_packet(&mut self) -> Result<&[u8], EncodeError> {
        let mut writer = PacketWriter::new(&mut self.packet_scratch_space);
        writer.write_data_message(self.id, &self.data)?;
        Ok(&self.packet_scratch_space)
    }

    /// Writes an acknowledgement of this channel into the scratch buffer
    pub fn acknowledge_packet(&mut self) -> &[u8] {
        let mut writer = PacketWriter::new(&mut self.packet_scratch_space);
        writer.write_channel_acknowledge(self.id);
        &self.packet_scratch_space
    }
}

/// Channels compare by id and tree. The scratch buffer and ack state are ignored.
impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_broadcast, validate_packet, PacketValidity};

    #[test]
    fn test_packets_reuse_scratch() {
        let mut channel = Channel::new(4, Part::record("m", vec![Part::uint16("a")]));
        channel.data_mut().field_mut("a").unwrap().set_value(513u16);

        let broadcast = channel.broadcast_packet().unwrap().to_vec();
        let (id, schema) = decode_broadcast(&broadcast).unwrap();
        assert_eq!(id, 4);
        assert!(schema.same_schema(channel.data()));

        let data = channel.data_packet().unwrap();
        assert_eq!(&data[..4], &[0x80, 4, 0x01, 0x02]);
        assert_eq!(validate_packet(data), PacketValidity::Ok);

        let ack = channel.acknowledge_packet();
        assert_eq!(&ack[..2], &[0x40, 4]);
    }

    #[test]
    fn test_not_acked_until_told() {
        let mut channel = Channel::new(0, Part::string("s"));
        assert!(!channel.is_acked());
        channel.set_acked(true);
        assert!(channel.is_acked());
    }
}
