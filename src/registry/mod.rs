//! Channel bookkeeping for both ends of a VDP link.
//!
//! The registry owns the channels we advertise (local) and the channels the
//! peer advertised to us (remote). Every packet the device receives goes
//! through [`Registry::handle_packet`]:
//!
//! * a broadcast teaches us (or re-teaches us) the schema of a remote channel
//! * a data message updates the values of a known remote channel
//! * an acknowledgement marks one of our local channels as seen by the peer
//!
//! The peer is considered to be "in data mode" once it starts sending data.
//! A broadcast received in data mode means the peer restarted and is
//! advertising a new set of channels, so every remote channel is forgotten
//! before the new one is stored.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::devices::Device;
use crate::errors::{DecodeError, RegistryError};
use crate::protocol::{
    decode_header_byte, dump_packet, ensure_consumed, validate_packet, PacketFunction, PacketHeader, PacketReader,
    PacketType, PacketValidity, PacketWriter, CHECKSUM_SIZE,
};
use crate::types::{make_decoder, Part};

mod channel;

pub use channel::Channel;

/// The one byte id of a channel
pub type ChannelID = u8;

/// How many channels fit in the id space
pub const MAX_CHANNELS: usize = ChannelID::MAX as usize + 1;

/// Called with a snapshot of the channel that was learned or updated
pub type ChannelCallback = Arc<dyn Fn(&Channel) + Send + Sync>;

/// Behaviour switches for a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Reply to every received broadcast with an acknowledgement
    pub acknowledge_broadcasts: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            acknowledge_broadcasts: true,
        }
    }
}

/// What [`Registry::handle_packet`] did with a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A remote channel's schema was stored
    SchemaLearned(ChannelID),
    /// A remote channel's values were updated
    DataReceived(ChannelID),
    /// One of our local channels was acknowledged
    Acknowledged(ChannelID),
    /// The packet was valid but had nothing to act on
    Ignored,
}

#[derive(Debug, Default)]
struct State {
    local: Vec<Channel>,
    remote: BTreeMap<ChannelID, Channel>,
    data_mode: bool,
}

#[derive(Default)]
struct Callbacks {
    on_broadcast: Option<ChannelCallback>,
    on_data: Option<ChannelCallback>,
}

/// Matches schemas to data for one device
pub struct Registry {
    device: Arc<dyn Device>,
    config: RegistryConfig,
    state: Mutex<State>,
    callbacks: Mutex<Callbacks>,
}

impl Registry {
    /// Creates a registry with the default config and starts listening on `device`
    pub fn new(device: Arc<dyn Device>) -> Arc<Self> {
        Self::with_config(device, RegistryConfig::default())
    }

    /// Creates a registry and starts listening on `device`
    pub fn with_config(device: Arc<dyn Device>, config: RegistryConfig) -> Arc<Self> {
        let registry = Arc::new(Self {
            device: device.clone(),
            config,
            state: Mutex::new(State::default()),
            callbacks: Mutex::new(Callbacks::default()),
        });

        // Weak so the device does not keep the registry alive
        let weak: Weak<Self> = Arc::downgrade(&registry);
        device.register_receive_callback(Box::new(move |packet| {
            let registry = match weak.upgrade() {
                Some(r) => r,
                None => return,
            };
            if let Err(e) = registry.handle_packet(packet) {
                tracing::warn!("Dropped packet: {e}");
            }
        }));

        registry
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Sets the function called whenever a remote schema is learned
    pub fn install_broadcast_callback<F>(&self, callback: F)
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        self.callbacks.lock().on_broadcast = Some(Arc::new(callback));
    }

    /// Sets the function called whenever remote data arrives
    pub fn install_data_callback<F>(&self, callback: F)
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        self.callbacks.lock().on_data = Some(Arc::new(callback));
    }

    /// Adds a local channel and returns its id. Ids are handed out in order from 0.
    pub fn open_channel(&self, data: Part) -> Result<ChannelID, RegistryError> {
        let mut state = self.state.lock();

        // Get the next free id
        let id = match ChannelID::try_from(state.local.len()) {
            Ok(id) => id,
            Err(_) => return Err(RegistryError::TooManyChannels(MAX_CHANNELS)),
        };

        tracing::debug!(id, name = data.name(), "Opened local channel");
        state.local.push(Channel::new(id, data));
        Ok(id)
    }

    /// Refreshes and broadcasts the schema of a local channel
    pub fn broadcast_channel(&self, id: ChannelID) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let channel = state
            .local
            .get_mut(id as usize)
            .ok_or(RegistryError::UnknownChannel(id))?;

        channel.fetch();
        let packet = channel.broadcast_packet()?;
        tracing::trace!("Broadcasting channel {id}:\n{}", dump_packet(packet));
        self.device.send_packet(packet)?;
        Ok(())
    }

    /// Broadcasts every local channel
    pub fn broadcast_all(&self) -> Result<(), RegistryError> {
        let count = self.state.lock().local.len();
        for id in 0..count {
            self.broadcast_channel(id as ChannelID)?;
        }
        Ok(())
    }

    /// Broadcasts every local channel the peer has not acknowledged yet.
    ///
    /// Returns how many were sent.
    pub fn broadcast_unacked(&self) -> Result<usize, RegistryError> {
        let unacked: Vec<ChannelID> = self
            .state
            .lock()
            .local
            .iter()
            .filter(|c| !c.is_acked())
            .map(|c| c.id())
            .collect();

        for id in &unacked {
            self.broadcast_channel(*id)?;
        }
        Ok(unacked.len())
    }

    /// Refreshes a local channel from its fetchers and sends its values
    pub fn send_data(&self, id: ChannelID) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let channel = state
            .local
            .get_mut(id as usize)
            .ok_or(RegistryError::UnknownChannel(id))?;

        channel.fetch();
        let packet = channel.data_packet()?;
        tracing::trace!("Sending data for channel {id}:\n{}", dump_packet(packet));
        self.device.send_packet(packet)?;
        Ok(())
    }

    /// Tells the peer we have learned remote channel `id`
    pub fn acknowledge(&self, id: ChannelID) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let channel = state.remote.get_mut(&id).ok_or(RegistryError::UnknownChannel(id))?;

        let packet = channel.acknowledge_packet();
        self.device.send_packet(packet)?;
        Ok(())
    }

    /// Sends the values currently stored for remote channel `id` back to the peer
    pub fn send_remote_data(&self, id: ChannelID) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let channel = state.remote.get_mut(&id).ok_or(RegistryError::UnknownChannel(id))?;

        let packet = channel.data_packet()?;
        tracing::debug!(id, "Writing back remote channel");
        self.device.send_packet(packet)?;
        Ok(())
    }

    /// Feeds a tree of values for remote channel `id` through the receive path.
    ///
    /// The tree must have the schema learned for the channel. The registry
    /// then behaves exactly as if the peer had sent these values, data
    /// callback included.
    pub fn submit_response(&self, id: ChannelID, data: &Part) -> Result<Event, RegistryError> {
        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        writer.write_data_message(id, data)?;

        tracing::trace!("Submitting packet:\n{}", dump_packet(&scratch));
        let (_header, id, mut reader) = open_packet(&scratch)?;

        // The schema is compared under the same lock the values are decoded under
        self.handle_data(id, &mut reader, Some(data))
    }

    /// Processes one received packet. A returned error means the packet was dropped.
    pub fn handle_packet(&self, packet: &[u8]) -> Result<Event, RegistryError> {
        tracing::trace!("Received packet:\n{}", dump_packet(packet));

        let (header, id, mut reader) = open_packet(packet)?;
        tracing::debug!(id, ?header, "Dispatching packet");

        match (header.packet_type, header.function) {
            (PacketType::Broadcast, PacketFunction::Send) => self.handle_broadcast(id, &mut reader),
            (PacketType::Data, PacketFunction::Send) => self.handle_data(id, &mut reader, None),
            (PacketType::Broadcast, PacketFunction::Acknowledge) => self.handle_acknowledge(id),
            (PacketType::Data, PacketFunction::Acknowledge) => {
                tracing::debug!(id, "Ignoring data acknowledgement");
                Ok(Event::Ignored)
            }
        }
    }

    fn handle_broadcast(&self, id: ChannelID, reader: &mut PacketReader) -> Result<Event, RegistryError> {
        let schema = make_decoder(reader)?;
        ensure_consumed(reader)?;

        let mut channel = Channel::new(id, schema);

        let snapshot = {
            let mut state = self.state.lock();

            // A broadcast after data started flowing means the peer restarted
            if state.data_mode {
                tracing::info!("Broadcast received in data mode, forgetting {} channel(s)", state.remote.len());
                state.remote.clear();
                state.data_mode = false;
            }

            tracing::debug!(id, "Learned channel:\n{}", channel.data().pretty_print());

            if self.config.acknowledge_broadcasts {
                let ack = channel.acknowledge_packet();
                if let Err(e) = self.device.send_packet(ack) {
                    tracing::warn!(id, "Failed to acknowledge broadcast: {e}");
                }
            }

            state.remote.insert(id, channel.clone());
            channel
        };

        let callback = self.callbacks.lock().on_broadcast.clone();
        if let Some(callback) = callback {
            callback(&snapshot);
        }

        Ok(Event::SchemaLearned(id))
    }

    /// Decodes values for remote channel `id`. With `expected` set, the stored
    /// schema must match it or nothing is decoded.
    fn handle_data(
        &self,
        id: ChannelID,
        reader: &mut PacketReader,
        expected: Option<&Part>,
    ) -> Result<Event, RegistryError> {
        let snapshot = {
            let mut state = self.state.lock();
            let stored = state.remote.get_mut(&id).ok_or(RegistryError::UnknownChannel(id))?;

            if let Some(expected) = expected {
                if !stored.data().same_schema(expected) {
                    return Err(RegistryError::SchemaMismatch(id));
                }
            }

            // Decode into a copy so a short packet can not leave half written values behind
            let mut updated = stored.data().clone();
            updated.read_data_from_message(reader)?;
            ensure_consumed(reader)?;

            *stored.data_mut() = updated;
            let snapshot = stored.clone();
            state.data_mode = true;
            snapshot
        };

        let callback = self.callbacks.lock().on_data.clone();
        if let Some(callback) = callback {
            callback(&snapshot);
        }

        Ok(Event::DataReceived(id))
    }

    fn handle_acknowledge(&self, id: ChannelID) -> Result<Event, RegistryError> {
        let mut state = self.state.lock();
        let channel = state
            .local
            .get_mut(id as usize)
            .ok_or(RegistryError::UnknownChannel(id))?;

        channel.set_acked(true);
        tracing::debug!(id, "Channel acknowledged");
        Ok(Event::Acknowledged(id))
    }

    /// A copy of remote channel `id`
    pub fn remote_channel(&self, id: ChannelID) -> Option<Channel> {
        self.state.lock().remote.get(&id).cloned()
    }

    /// Copies of every remote channel, ordered by id
    pub fn remote_channels(&self) -> Vec<Channel> {
        self.state.lock().remote.values().cloned().collect()
    }

    /// A copy of local channel `id`
    pub fn local_channel(&self, id: ChannelID) -> Option<Channel> {
        self.state.lock().local.get(id as usize).cloned()
    }

    /// Runs `f` on local channel `id`, e.g. to set values before [`Registry::send_data`].
    ///
    /// `f` works on a copy taken without holding the registry lock, so it may
    /// call back into the registry. Its edits to the tree are stored once it
    /// returns. If two callers edit the same channel at once the last one wins.
    pub fn with_local_channel<R>(&self, id: ChannelID, f: impl FnOnce(&mut Channel) -> R) -> Option<R> {
        let mut copy = self.local_channel(id)?;
        let result = f(&mut copy);

        let mut state = self.state.lock();
        let stored = state.local.get_mut(id as usize)?;
        *stored.data_mut() = copy.into_data();
        Some(result)
    }

    /// Whether the peer acknowledged local channel `id`
    pub fn is_acked(&self, id: ChannelID) -> bool {
        self.state
            .lock()
            .local
            .get(id as usize)
            .map(Channel::is_acked)
            .unwrap_or(false)
    }

    /// Whether data has been received since the last broadcast
    pub fn in_data_mode(&self) -> bool {
        self.state.lock().data_mode
    }
}

/// Validates a packet and reads its header and channel id.
///
/// The returned reader is positioned at the payload and stops short of the checksum.
fn open_packet(packet: &[u8]) -> Result<(PacketHeader, ChannelID, PacketReader<'_>), RegistryError> {
    // Nothing in an invalid packet can be trusted, not even the header
    match validate_packet(packet) {
        PacketValidity::Ok => {}
        invalid => return Err(DecodeError::Invalid(invalid).into()),
    }

    let mut reader = PacketReader::new(&packet[..packet.len() - CHECKSUM_SIZE]);
    let header = decode_header_byte(reader.get_byte()?);
    let id = reader.get_number::<ChannelID>()?;
    Ok((header, id, reader))
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}
