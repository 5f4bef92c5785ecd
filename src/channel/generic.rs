//! Generic read/write access over a long-lived per-device connection.
//!
//! Used when the device profile dictates a known response size: the caller
//! supplies an upper bound and the channel accumulates physical reads until
//! the bound is covered or the line goes quiet.

use crate::error::DriverError;
use crate::port::{PortConfig, PortError, PortHandle};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// The transport layer caps one physical read near this many bytes in
/// practice, regardless of the scratch buffer size.
const PHYSICAL_READ_CHUNK: usize = 16;

/// Scratch buffer handed to each physical read.
const READ_BUFFER_LEN: usize = 128;

struct GenericIo {
    handle: PortHandle,
    rx: Vec<u8>,
}

/// Long-lived bounded read/write channel for one device location.
///
/// All operations on one channel are serialized through the internal I/O
/// lock. A read finding the lock held is dropped with
/// [`DriverError::DeviceBusy`]; a write queues behind the holder instead.
pub struct GenericChannel {
    path: String,
    io: Mutex<GenericIo>,
}

impl GenericChannel {
    /// Open the device and wrap it. If the open fails the channel is still
    /// constructed; operations report the port as unavailable.
    pub fn new(config: PortConfig) -> Self {
        let path = config.path.clone();
        let handle = PortHandle::open(config);
        Self::with_handle(path, handle)
    }

    /// Build a channel around an existing handle (mock injection in tests,
    /// handle reuse on re-initialization).
    pub fn with_handle(path: impl Into<String>, handle: PortHandle) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(GenericIo {
                handle,
                rx: Vec::new(),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.io.lock().handle.is_connected()
    }

    /// One logical read bounded by `max_bytes`.
    ///
    /// Issues `ceil(max_bytes / 16)` physical read attempts, appending each
    /// chunk to the accumulation buffer and stopping early when the line
    /// goes quiet. On success the buffer is returned and cleared. On a
    /// transport error the port is flushed, the error propagates, and the
    /// bytes accumulated so far stay buffered for the next successful read
    /// to return; an error does not mean zero bytes were received.
    ///
    /// If another read is in flight the request is dropped immediately with
    /// [`DriverError::DeviceBusy`]; it never blocks and never queues.
    pub fn read(&self, max_bytes: usize) -> Result<Vec<u8>, DriverError> {
        let Some(mut io) = self.io.try_lock() else {
            warn!(device = %self.path, "device busy, read request dropped");
            return Err(DriverError::DeviceBusy(self.path.clone()));
        };

        let attempts = max_bytes.div_ceil(PHYSICAL_READ_CHUNK).max(1);
        debug!(device = %self.path, max_bytes, attempts, "generic read");

        for _ in 0..attempts {
            match io.handle.read(READ_BUFFER_LEN) {
                Ok(chunk) => io.rx.extend_from_slice(&chunk),
                Err(PortError::EndOfStream) => {
                    debug!(device = %self.path, "finished reading");
                    break;
                }
                Err(err) => {
                    warn!(device = %self.path, %err, "generic read aborted");
                    if let Err(flush_err) = io.handle.flush() {
                        debug!(device = %self.path, %flush_err, "flush after failed read");
                    }
                    return Err(err.into());
                }
            }
        }

        io.handle.flush()?;
        Ok(std::mem::take(&mut io.rx))
    }

    /// Flush stale input, then write `data`. Queues behind an in-flight
    /// read rather than interleaving with it.
    pub fn write(&self, data: &[u8]) -> Result<usize, DriverError> {
        let mut io = self.io.lock();
        io.handle.flush()?;
        let written = io.handle.write(data)?;
        debug!(device = %self.path, written, "generic write");
        Ok(written)
    }

    /// Release the OS handle. Subsequent operations report the port as
    /// unavailable until the channel is reconfigured.
    pub fn close(&self) {
        self.io.lock().handle.close();
    }
}

impl std::fmt::Debug for GenericChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericChannel")
            .field("path", &self.path)
            .finish()
    }
}
