//! Owned lifecycle of one serial connection.
//!
//! A `PortHandle` is exclusively owned by exactly one channel object and is
//! never shared. Open failures leave the handle with an absent connection;
//! every operation on such a handle fails fast with
//! [`PortError::Unavailable`] instead of panicking or retrying.

use super::error::PortError;
use super::sync_port::SyncSerialLink;
use super::traits::{PortConfig, SerialLink};
use tracing::warn;

/// One open (or failed-to-open) serial connection plus its identity.
#[derive(Debug)]
pub struct PortHandle {
    config: PortConfig,
    link: Option<Box<dyn SerialLink>>,
}

impl PortHandle {
    /// Attempt to open the configured device.
    ///
    /// Never retries. On failure the handle is returned with an absent
    /// connection and the failure is logged; callers can check
    /// [`is_connected`](Self::is_connected) to fail fast.
    pub fn open(config: PortConfig) -> Self {
        let link = match SyncSerialLink::open(&config) {
            Ok(link) => Some(Box::new(link) as Box<dyn SerialLink>),
            Err(err) => {
                warn!(device = %config.path, %err, "open serial failed");
                None
            }
        };
        Self { config, link }
    }

    /// Wrap an already-established link. Used to inject mocks in tests;
    /// behaves identically to a handle opened on hardware.
    pub fn from_link(config: PortConfig, link: Box<dyn SerialLink>) -> Self {
        Self {
            config,
            link: Some(link),
        }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// False when open failed or the handle has been closed.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// One physical read of up to `max_bytes`, blocking up to the
    /// configured read timeout.
    ///
    /// Short reads are normal. A read returning zero bytes, or failing with
    /// `TimedOut` / `WouldBlock` / `UnexpectedEof`, is reported as
    /// [`PortError::EndOfStream`]: the quiescence signal receive loops
    /// terminate on, not a fault.
    pub fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, PortError> {
        let link = self.link_mut()?;
        let mut buffer = vec![0u8; max_bytes];
        match link.read_bytes(&mut buffer) {
            Ok(0) => Err(PortError::EndOfStream),
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(PortError::Read(err)) if is_quiescence(&err) => Err(PortError::EndOfStream),
            Err(err) => Err(err),
        }
    }

    /// Blocking write of `data`. A returned count shorter than `data.len()`
    /// is not retried here; the caller decides.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.link_mut()?.write_bytes(data)
    }

    /// Discard any buffered-but-unread bytes. Called before a controlled
    /// close and before each new logical receive so stale bytes cannot leak
    /// into the next frame.
    pub fn flush(&mut self) -> Result<(), PortError> {
        self.link_mut()?.flush()
    }

    /// Release the OS handle. Idempotent; safe to call when open failed.
    pub fn close(&mut self) {
        self.link = None;
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>, PortError> {
        self.link
            .as_mut()
            .ok_or_else(|| PortError::unavailable(&self.config.path))
    }
}

fn is_quiescence(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::{MockLink, MockStep};
    use std::time::Duration;

    fn test_config() -> PortConfig {
        PortConfig::new("/dev/ttyMOCK", 9600, Duration::from_millis(10))
    }

    fn absent_handle() -> PortHandle {
        PortHandle {
            config: test_config(),
            link: None,
        }
    }

    #[test]
    fn absent_handle_fails_fast() {
        let mut handle = absent_handle();
        assert!(!handle.is_connected());
        assert!(matches!(handle.read(16), Err(PortError::Unavailable(_))));
        assert!(matches!(handle.write(b"x"), Err(PortError::Unavailable(_))));
        assert!(matches!(handle.flush(), Err(PortError::Unavailable(_))));
    }

    #[test]
    fn close_is_idempotent() {
        let mut handle = absent_handle();
        handle.close();
        handle.close();
        assert!(!handle.is_connected());
    }

    #[test]
    fn timeout_becomes_end_of_stream() {
        let mock = MockLink::new("/dev/ttyMOCK");
        mock.script([MockStep::io_error(std::io::ErrorKind::TimedOut)]);
        let mut handle = PortHandle::from_link(test_config(), Box::new(mock.clone()));
        assert!(matches!(handle.read(16), Err(PortError::EndOfStream)));
    }

    #[test]
    fn short_read_is_returned_as_is() {
        let mock = MockLink::new("/dev/ttyMOCK");
        mock.script([MockStep::data(b"ab")]);
        let mut handle = PortHandle::from_link(test_config(), Box::new(mock.clone()));
        assert_eq!(handle.read(16).unwrap(), b"ab");
    }

    #[test]
    fn close_drops_the_link() {
        let mock = MockLink::new("/dev/ttyMOCK");
        let mut handle = PortHandle::from_link(test_config(), Box::new(mock.clone()));
        assert!(handle.is_connected());
        handle.close();
        assert!(!handle.is_connected());
        assert!(mock.is_dropped());
    }
}
