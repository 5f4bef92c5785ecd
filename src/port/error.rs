//! Port-specific error types.
//!
//! Transport-level errors stay in this module; driver-level conditions
//! (busy, no-response, unsupported mode) live in the crate-level error type.

use thiserror::Error;

/// Errors that can occur on a single serial connection.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device could not be opened, or an operation was attempted on a
    /// handle whose open already failed.
    #[error("serial device unavailable: {0}")]
    Unavailable(String),

    /// Nothing more is available in this timeout window. This is the
    /// normal terminator for receive loops, not a fault, and is never
    /// surfaced to callers as a failure.
    #[error("end of stream")]
    EndOfStream,

    /// A read failed for a reason other than the timeout window elapsing.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// A write failed before the full buffer was accepted.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// An error reported by the underlying serialport stack.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create an `Unavailable` error naming the device path.
    pub fn unavailable(path: impl Into<String>) -> Self {
        Self::Unavailable(path.into())
    }

    /// True when the error is the normal end-of-stream terminator.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}
