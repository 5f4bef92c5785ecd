//! Real serial connection backed by the `serialport` crate.

use super::error::PortError;
use super::traits::{PortConfig, SerialLink};
use std::io::{Read, Write};

/// Blocking serial connection wrapping `serialport::SerialPort`.
pub struct SyncSerialLink {
    port: Box<dyn serialport::SerialPort>,
    path: String,
}

impl SyncSerialLink {
    /// Open the named device at the configured baud rate and read timeout.
    ///
    /// Data bits, parity, stop bits and flow control are fixed at 8N1/none;
    /// the devices this service fronts do not negotiate them.
    pub fn open(config: &PortConfig) -> Result<Self, PortError> {
        let port = serialport::new(&config.path, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::unavailable(&config.path),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }
}

impl SerialLink for SyncSerialLink {
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Read)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Write)
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(PortError::Serial)
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SyncSerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialLink")
            .field("path", &self.path)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn open_missing_device_reports_unavailable() {
        let config = PortConfig::new(
            "/dev/nonexistent_uart_49152",
            9600,
            Duration::from_millis(100),
        );
        let result = SyncSerialLink::open(&config);
        assert!(result.is_err());
    }
}
