//! One-shot write-then-read exchanges.
//!
//! For devices with no persistent session (AT-command style): each
//! transaction opens its own port, sends the request, drains the response
//! until the line goes quiet, and closes the port on every exit path.

use crate::error::DriverError;
use crate::port::{PortConfig, PortError, PortHandle};
use parking_lot::Mutex;
use tracing::debug;

const EXCHANGE_READ_LEN: usize = 1024;

#[derive(Default)]
struct LastExchange {
    rx: Vec<u8>,
    rx_len: usize,
}

/// Transceiver-mode channel for one device location.
///
/// Stateless across calls except for the last completed exchange, retained
/// until [`take_last`](Self::take_last) consumes it.
#[derive(Default)]
pub struct TransactionChannel {
    last: Mutex<LastExchange>,
}

impl TransactionChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one write-then-read exchange and retain its result.
    ///
    /// Returns the response length. Zero is a normal outcome (the device
    /// had nothing to say within the timeout window); the caller decides
    /// whether that is a no-response condition worth reporting.
    pub fn transact(&self, config: &PortConfig, tx: &[u8]) -> Result<usize, DriverError> {
        let mut handle = PortHandle::open(config.clone());
        if !handle.is_connected() {
            return Err(PortError::unavailable(&config.path).into());
        }

        let result = run_exchange(&mut handle, tx);
        handle.close();

        let rx = result?;
        let rx_len = rx.len();
        debug!(device = %config.path, tx_len = tx.len(), rx_len, "transaction complete");
        *self.last.lock() = LastExchange { rx, rx_len };
        Ok(rx_len)
    }

    /// Consume and clear the last exchange's response buffer and length.
    pub fn take_last(&self) -> (Vec<u8>, usize) {
        let mut last = self.last.lock();
        let taken = std::mem::take(&mut *last);
        (taken.rx, taken.rx_len)
    }
}

impl std::fmt::Debug for TransactionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionChannel")
            .field("last_rx_len", &self.last.lock().rx_len)
            .finish()
    }
}

/// Write `tx`, then drain the response until end-of-stream.
///
/// An immediate end-of-stream with an empty buffer is the terminal
/// condition for a silent device and returns an empty response, not an
/// error. Any other read error aborts and discards the buffer. Does not
/// close the handle; the caller owns that on every path.
fn run_exchange(handle: &mut PortHandle, tx: &[u8]) -> Result<Vec<u8>, DriverError> {
    handle.write(tx)?;

    let mut rx = Vec::new();
    loop {
        match handle.read(EXCHANGE_READ_LEN) {
            Ok(chunk) => rx.extend_from_slice(&chunk),
            Err(PortError::EndOfStream) => return Ok(rx),
            Err(err) => return Err(err.into()),
        }
    }
}
