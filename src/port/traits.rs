//! Core trait and configuration for serial connections.
//!
//! `SerialLink` abstracts one OS serial handle so the channel algorithms can
//! run against real hardware or a scripted mock interchangeably.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies one physical serial endpoint. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// OS path of the serial device (e.g. "/dev/ttyS0", "COM3").
    pub path: String,

    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Maximum blocking duration of one physical read.
    pub read_timeout: Duration,
}

impl PortConfig {
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
        }
    }
}

/// One open serial connection.
///
/// Implementations perform blocking I/O bounded by the configured read
/// timeout. Ports are opened 8N1 without flow control; only path, baud rate
/// and timeout vary per device.
pub trait SerialLink: Send + std::fmt::Debug {
    /// One physical read into `buffer`, returning the number of bytes
    /// received. Returning fewer bytes than the buffer holds is normal.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Blocking write. A short count means the device accepted only part of
    /// the buffer; retrying is the caller's decision.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Discard buffered-but-unread bytes so a previous exchange cannot leak
    /// into the next logical frame.
    fn flush(&mut self) -> Result<(), PortError>;

    /// OS path this link was opened on.
    fn path(&self) -> &str;
}
