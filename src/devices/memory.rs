//! A device that never leaves the process.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::DeviceError;

use super::{Device, ReceiveCallback};

/// Records every sent packet and lets the caller inject received ones.
///
/// Useful for tests and for wiring two registries back to back.
#[derive(Default)]
pub struct MemoryDevice {
    sent: Mutex<Vec<Vec<u8>>>,
    callback: Mutex<Option<Arc<ReceiveCallback>>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `packet` as if it had been received from the peer.
    ///
    /// Returns false if nothing is listening.
    pub fn inject(&self, packet: &[u8]) -> bool {
        // Clone the callback out so it does not run under our lock
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(packet);
                true
            }
            None => false,
        }
    }

    /// Every packet sent so far, oldest first
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Removes and returns every packet sent so far
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Device for MemoryDevice {
    fn send_packet(&self, packet: &[u8]) -> Result<(), DeviceError> {
        tracing::trace!(size = packet.len(), "memory device send");
        self.sent.lock().push(packet.to_vec());
        Ok(())
    }

    fn register_receive_callback(&self, callback: ReceiveCallback) {
        *self.callback.lock() = Some(Arc::new(callback));
    }
}

impl std::fmt::Debug for MemoryDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDevice")
            .field("sent", &self.sent.lock().len())
            .field("listening", &self.callback.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inject_and_record() {
        let device = MemoryDevice::new();
        assert!(!device.inject(&[1, 2, 3]));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        device.register_receive_callback(Box::new(move |packet| {
            counter.fetch_add(packet.len(), Ordering::SeqCst);
        }));
        assert!(device.inject(&[1, 2, 3]));
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        device.send_packet(&[9]).unwrap();
        device.send_packet(&[8, 7]).unwrap();
        assert_eq!(device.sent(), vec![vec![9], vec![8, 7]]);
        assert_eq!(device.take_sent().len(), 2);
        assert!(device.sent().is_empty());
    }
}
