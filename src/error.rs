//! Driver-level error type.
//!
//! Sits above [`crate::port::PortError`] the way the host-facing surface
//! needs it: transport faults pass through, while the conditions the driver
//! itself produces (busy drop, empty transaction, bad attributes) get their
//! own variants. Nothing here retries; every retry or backoff decision
//! belongs to the caller.

use crate::port::PortError;
use thiserror::Error;

/// Errors surfaced to the host for one logical command.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport-level failure (open, read or write).
    #[error(transparent)]
    Port(#[from] PortError),

    /// A generic-mode read found another read in flight. Deliberate
    /// drop-the-request policy: the command is discarded, not queued, so
    /// auto-polling cannot stack up against a slow device. Non-fatal.
    #[error("device {0} busy, read request dropped")]
    DeviceBusy(String),

    /// A transaction completed but the device sent nothing back.
    /// Recoverable; distinct from a transport fault.
    #[error("no response")]
    NoResponse,

    /// Unknown access mode or value type. A configuration or programming
    /// error in the device profile, surfaced immediately.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A required attribute is missing or failed to parse.
    #[error("invalid attribute '{key}': {message}")]
    InvalidAttribute { key: String, message: String },

    /// Malformed command payload, e.g. odd-length hex or a response too
    /// short for the declared value type.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl DriverError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    pub fn invalid_attribute(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            key: key.into(),
            message: message.into(),
        }
    }

    /// True for conditions the host should treat as a degraded-but-healthy
    /// result rather than a command failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DeviceBusy(_) | Self::NoResponse)
    }
}

impl From<hex::FromHexError> for DriverError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_no_response_are_recoverable() {
        assert!(DriverError::DeviceBusy("/dev/ttyS1".into()).is_recoverable());
        assert!(DriverError::NoResponse.is_recoverable());
        assert!(!DriverError::unsupported("mode 'x'").is_recoverable());
    }

    #[test]
    fn hex_errors_map_to_invalid_payload() {
        let err: DriverError = hex::decode("abc").unwrap_err().into();
        assert!(matches!(err, DriverError::InvalidPayload(_)));
    }

    #[test]
    fn display_formats() {
        let err = DriverError::invalid_attribute("baud", "not a number");
        assert_eq!(err.to_string(), "invalid attribute 'baud': not a number");
        assert_eq!(
            DriverError::DeviceBusy("/dev/ttyS1".into()).to_string(),
            "device /dev/ttyS1 busy, read request dropped"
        );
    }
}
