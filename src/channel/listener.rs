//! Background line monitor.
//!
//! Continuously drains a serial line on a dedicated thread so a burst
//! arriving between externally-scheduled polls is not lost. A burst followed
//! by an idle gap is one frame; the latest frame is kept until the owner
//! consumes it.

use crate::error::DriverError;
use crate::port::{PortConfig, PortError, PortHandle};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Read timeout of the poll loop. Short so the loop stays responsive to
/// stop requests.
pub const POLL_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// How long callers must wait after `start` before expecting data; opening
/// and the first read cycle are asynchronous relative to the caller.
pub const START_GRACE_PERIOD: Duration = Duration::from_millis(100);

const LISTEN_READ_LEN: usize = 1024;

/// State shared between the owner and the background loop.
///
/// `enabled` is the cooperative stop signal; `active` reflects whether the
/// loop is currently running. Stop flips `enabled`, the loop observes it,
/// exits, and only then clears `active`.
struct ListenerShared {
    rx: Mutex<Vec<u8>>,
    active: AtomicBool,
    enabled: AtomicBool,
}

/// Monitor-mode channel for one device location.
pub struct ListenerChannel {
    config: PortConfig,
    shared: Arc<ListenerShared>,
}

impl ListenerChannel {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            config: PortConfig::new(path, baud_rate, POLL_READ_TIMEOUT),
            shared: Arc::new(ListenerShared {
                rx: Mutex::new(Vec::new()),
                active: AtomicBool::new(false),
                enabled: AtomicBool::new(false),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// Whether the background loop is currently running.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Open the device and begin the accumulation loop on a background
    /// thread. A no-op when already listening.
    ///
    /// Callers must wait [`START_GRACE_PERIOD`] before expecting captured
    /// data.
    pub fn start(&self) -> Result<(), DriverError> {
        if self.is_active() {
            return Ok(());
        }

        let handle = PortHandle::open(self.config.clone());
        if !handle.is_connected() {
            return Err(PortError::unavailable(&self.config.path).into());
        }

        self.spawn_loop(handle)
    }

    /// Request the loop to stop. Cooperative and asynchronous: the loop
    /// observes the signal within one poll timeout, publishes any pending
    /// bytes, closes the port and clears `active`. Callers must re-check
    /// [`is_active`](Self::is_active) before assuming the port is closed.
    pub fn stop(&self) {
        self.shared.enabled.store(false, Ordering::Release);
    }

    /// Consume and clear the last published frame. Possibly empty; never an
    /// error while the listener is active.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.shared.rx.lock())
    }

    fn spawn_loop(&self, handle: PortHandle) -> Result<(), DriverError> {
        self.shared.enabled.store(true, Ordering::Release);
        self.shared.active.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let thread_name = format!("uart-listen{}", self.config.path.replace('/', "-"));
        let spawned = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || listen_loop(handle, shared));

        if let Err(err) = spawned {
            self.shared.enabled.store(false, Ordering::Release);
            self.shared.active.store(false, Ordering::Release);
            warn!(device = %self.config.path, %err, "failed to spawn listen thread");
            return Err(PortError::unavailable(&self.config.path).into());
        }

        info!(device = %self.config.path, "listening");
        Ok(())
    }
}

impl std::fmt::Debug for ListenerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChannel")
            .field("path", &self.config.path)
            .field("active", &self.is_active())
            .finish()
    }
}

fn listen_loop(mut handle: PortHandle, shared: Arc<ListenerShared>) {
    let path = handle.path().to_string();
    let mut local: Vec<u8> = Vec::new();

    loop {
        // The stop signal is observed on every iteration, so stop latency is
        // bounded by one poll timeout even when the device never goes idle.
        if !shared.enabled.load(Ordering::Acquire) {
            publish_pending(&shared, &mut local);
            break;
        }

        match handle.read(LISTEN_READ_LEN) {
            Ok(chunk) => local.extend_from_slice(&chunk),
            Err(PortError::EndOfStream) => {
                if !Path::new(&path).exists() {
                    // Physical disconnect.
                    publish_pending(&shared, &mut local);
                    break;
                }
                if !local.is_empty() {
                    // Idle gap closes the frame.
                    *shared.rx.lock() = std::mem::take(&mut local);
                }
            }
            Err(err) => {
                // Availability of the listener wins over completeness of any
                // single frame: drop the partial frame and keep looping.
                warn!(device = %path, %err, "listen read failed, frame discarded");
                local.clear();
            }
        }
    }

    handle.close();
    shared.active.store(false, Ordering::Release);
    info!(device = %path, "stopped listening");
}

fn publish_pending(shared: &ListenerShared, local: &mut Vec<u8>) {
    if !local.is_empty() {
        *shared.rx.lock() = std::mem::take(local);
    }
}
