//! A [`Device`] over a serial line (or any other async byte stream).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;

use crate::cobs::{self, Framer};
use crate::errors::DeviceError;

use super::{Device, ReceiveCallback, DEFAULT_BAUD_RATE, SERIAL_TIMEOUT_NS, SERIAL_TIMEOUT_SECONDS};

/// How many encoded frames may wait for the writer before sends start failing
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Size of a single read from the stream
const READ_CHUNK_SIZE: usize = 256;

type SharedCallback = Arc<Mutex<Option<Arc<ReceiveCallback>>>>;

/// How to open a serial port
///
/// # Members
///
/// * `port_name` - The system name of the port, e.g. `/dev/ttyUSB0` or `COM3`
/// * `baud_rate` - Line speed in bits per second
/// * `timeout` - The timeout handed to the serial driver
/// * `queue_depth` - How many outgoing frames may be queued at once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub queue_depth: usize,
}

impl SerialConfig {
    /// The default settings for the port called `port_name`
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::new(SERIAL_TIMEOUT_SECONDS, SERIAL_TIMEOUT_NS),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Sends and receives COBS framed packets over an async stream.
///
/// Two tasks are spawned on the current tokio runtime: one reads the stream,
/// splits it into frames and hands each decoded packet to the receive
/// callback, the other writes queued frames out in order. Dropping the device
/// stops the reader at once. The writer keeps running until every frame that
/// was already queued has been written, then exits.
pub struct SerialDevice {
    outgoing: mpsc::Sender<Vec<u8>>,
    callback: SharedCallback,
    reader: JoinHandle<()>,
}

impl SerialDevice {
    /// Opens the serial port described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &SerialConfig) -> Result<Self, DeviceError> {
        tracing::info!(port = %config.port_name, baud = config.baud_rate, "Opening serial port");

        // Open the port with 8N1 framing and no flow control
        let stream = tokio_serial::new(&config.port_name, config.baud_rate)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .data_bits(tokio_serial::DataBits::Eight)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.timeout)
            .open_native_async()?;

        Ok(Self::new(stream, config.queue_depth))
    }

    /// Wraps an already open stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S, queue_depth: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outgoing, incoming) = mpsc::channel(queue_depth.max(1));
        let callback: SharedCallback = Arc::new(Mutex::new(None));

        let reader = tokio::spawn(read_loop(read_half, callback.clone()));
        // Detached, it ends once the sender is dropped and the queue is drained
        tokio::spawn(write_loop(write_half, incoming));

        Self {
            outgoing,
            callback,
            reader,
        }
    }

    /// True once the writer has stopped and no more packets can be sent
    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}

impl Device for SerialDevice {
    fn send_packet(&self, packet: &[u8]) -> Result<(), DeviceError> {
        let frame = cobs::encode(packet);

        // The receiving framer drops anything longer than this between delimiters
        let encoded_len = frame.len().saturating_sub(2);
        if encoded_len > cobs::MAX_FRAME_SIZE {
            tracing::warn!("Refusing to send packet of {} byte(s), it encodes to {encoded_len}", packet.len());
            return Err(DeviceError::FrameTooLarge(encoded_len));
        }

        // Never block the caller, a full queue means the line can not keep up
        match self.outgoing.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Transmit queue is full, dropping packet of {} byte(s)", packet.len());
                Err(DeviceError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeviceError::Closed),
        }
    }

    fn register_receive_callback(&self, callback: ReceiveCallback) {
        *self.callback.lock() = Some(Arc::new(callback));
    }
}

impl Drop for SerialDevice {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reads the stream until it ends, delivering every frame to the callback
async fn read_loop<R: AsyncRead + Unpin>(mut stream: R, callback: SharedCallback) {
    let mut framer = Framer::default();
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Serial stream closed");
                break;
            }
            Ok(n) => n,
            // The driver timeout only means nothing arrived
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                tracing::warn!("Serial read failed: {e}");
                break;
            }
        };

        for frame in framer.push(&buf[..n]) {
            let packet = cobs::decode(&frame);

            // Clone the callback out so it can not deadlock against a re-registration
            let listener = callback.lock().clone();
            match listener {
                Some(listener) => listener(&packet),
                None => tracing::trace!("No listener for packet of {} byte(s)", packet.len()),
            }
        }
    }
}

/// Writes queued frames until the queue closes or the stream fails
async fn write_loop<W: AsyncWrite + Unpin>(mut stream: W, mut queue: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = stream.write_all(&frame).await {
            tracing::warn!("Serial write failed: {e}");
            break;
        }
        if let Err(e) = stream.flush().await {
            tracing::warn!("Serial flush failed: {e}");
            break;
        }
    }

    // Further sends now fail with Closed
    queue.close();
}
