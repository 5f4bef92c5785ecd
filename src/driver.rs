//! Host-facing driver facade.
//!
//! Receives one logical command at a time as an opaque attribute mapping,
//! resolves the channel through the registry, runs the mode-specific
//! protocol and converts the resulting byte buffer into the declared value
//! type. The channels themselves never see attributes, hex, or typed
//! values.

use crate::channel::START_GRACE_PERIOD;
use crate::config::Config;
use crate::error::DriverError;
use crate::port::{PortConfig, PortError};
use crate::registry::ChannelRegistry;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Access discipline requested for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Generic,
    Monitor,
    Transceiver,
}

impl AccessMode {
    fn parse(raw: &str) -> Result<Self, DriverError> {
        match raw {
            "generic" => Ok(Self::Generic),
            "monitor" => Ok(Self::Monitor),
            "transceiver" => Ok(Self::Transceiver),
            other => Err(DriverError::unsupported(format!("access mode '{other}'"))),
        }
    }
}

/// Value type declared by the device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int8,
    Int16,
    Text,
}

impl ValueKind {
    pub fn parse(raw: &str) -> Result<Self, DriverError> {
        match raw {
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "string" => Ok(Self::Text),
            other => Err(DriverError::unsupported(format!("value type '{other}'"))),
        }
    }
}

/// Typed result of a read command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    Int8(i8),
    Int16(i16),
    /// Hex transport representation of the raw buffer.
    Text(String),
}

impl CommandValue {
    pub fn into_json(self) -> Value {
        match self {
            Self::Int8(v) => Value::from(v),
            Self::Int16(v) => Value::from(v),
            Self::Text(v) => Value::from(v),
        }
    }
}

/// Defaults applied when a command omits an attribute.
#[derive(Debug, Clone)]
pub struct DriverDefaults {
    pub baud_rate: u32,
    pub timeout: u64,
    pub max_bytes: usize,
}

/// Per-command attributes supplied by the host.
///
/// `timeout` is kept unitless here because the wire format differs per
/// mode: generic commands carry seconds, transceiver commands carry
/// milliseconds. Numeric attributes may arrive as JSON numbers or numeric
/// strings; the host stringifies protocol properties.
#[derive(Debug, Clone)]
pub struct DeviceAttributes {
    pub mode: AccessMode,
    pub device: String,
    pub baud_rate: u32,
    pub timeout: u64,
    pub max_bytes: usize,
}

impl DeviceAttributes {
    pub fn from_value(value: &Value, defaults: &DriverDefaults) -> Result<Self, DriverError> {
        let map = value
            .as_object()
            .ok_or_else(|| DriverError::InvalidPayload("attributes must be an object".into()))?;

        let mode = AccessMode::parse(&require_str(map, "type")?)?;
        let device = require_str(map, "dev")?;
        let baud_rate = match optional_u64(map, "baud")? {
            Some(baud) => u32::try_from(baud)
                .map_err(|_| DriverError::invalid_attribute("baud", "out of range"))?,
            None => defaults.baud_rate,
        };
        let timeout = optional_u64(map, "timeout")?.unwrap_or(defaults.timeout);
        let max_bytes = match optional_u64(map, "maxbytes")? {
            Some(n) => usize::try_from(n)
                .map_err(|_| DriverError::invalid_attribute("maxbytes", "out of range"))?,
            None => defaults.max_bytes,
        };

        Ok(Self {
            mode,
            device,
            baud_rate,
            timeout,
            max_bytes,
        })
    }
}

fn require_str(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, DriverError> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(DriverError::invalid_attribute(key, "expected a string")),
        None => Err(DriverError::invalid_attribute(key, "missing")),
    }
}

fn optional_u64(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, DriverError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| DriverError::invalid_attribute(key, "expected a non-negative integer")),
        Some(Value::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DriverError::invalid_attribute(key, "expected a non-negative integer")),
        Some(_) => Err(DriverError::invalid_attribute(key, "expected a number")),
    }
}

/// The protocol driver: one instance per process, shared across request
/// handlers.
pub struct DeviceDriver {
    registry: ChannelRegistry,
    defaults: DriverDefaults,
}

impl DeviceDriver {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            defaults: DriverDefaults {
                baud_rate: config.serial.default_baud,
                timeout: config.serial.default_timeout,
                max_bytes: config.serial.default_max_bytes,
            },
        }
    }

    pub fn defaults(&self) -> &DriverDefaults {
        &self.defaults
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Run one read command.
    ///
    /// Generic mode converts the accumulated buffer to the declared value
    /// type; monitor and transceiver results are always the hex transport
    /// string, as the host protocol expects.
    pub fn handle_read(
        &self,
        attrs: &DeviceAttributes,
        kind: ValueKind,
    ) -> Result<CommandValue, DriverError> {
        debug!(device = %attrs.device, mode = ?attrs.mode, "read command");
        match attrs.mode {
            AccessMode::Generic => {
                let channel = self.registry.generic(&generic_port_config(attrs));
                let bytes = channel.read(attrs.max_bytes)?;
                convert_value(&bytes, kind)
            }
            AccessMode::Monitor => {
                let listener = self.registry.monitor(&attrs.device, attrs.baud_rate);
                if !listener.is_active() {
                    listener.start()?;
                    // Opening and the first read cycle run on the listener
                    // thread; give it one grace period before sampling.
                    std::thread::sleep(START_GRACE_PERIOD);
                }
                if listener.is_active() {
                    Ok(CommandValue::Text(hex::encode(listener.take())))
                } else {
                    Err(PortError::unavailable(&attrs.device).into())
                }
            }
            AccessMode::Transceiver => {
                let channel = self.registry.transceiver(&attrs.device);
                let (rx, _) = channel.take_last();
                Ok(CommandValue::Text(hex::encode(rx)))
            }
        }
    }

    /// Run one write command. `payload` is the hex transport string.
    pub fn handle_write(
        &self,
        attrs: &DeviceAttributes,
        payload: &str,
    ) -> Result<(), DriverError> {
        debug!(device = %attrs.device, mode = ?attrs.mode, "write command");
        match attrs.mode {
            AccessMode::Generic => {
                let tx = hex::decode(payload)?;
                let channel = self.registry.generic(&generic_port_config(attrs));
                channel.write(&tx)?;
                Ok(())
            }
            AccessMode::Transceiver => {
                let tx = hex::decode(payload)?;
                let channel = self.registry.transceiver(&attrs.device);
                let config = PortConfig::new(
                    &attrs.device,
                    attrs.baud_rate,
                    Duration::from_millis(attrs.timeout),
                );
                let rx_len = channel.transact(&config, &tx)?;
                if rx_len == 0 {
                    warn!(device = %attrs.device, "transaction got no response");
                    return Err(DriverError::NoResponse);
                }
                Ok(())
            }
            AccessMode::Monitor => Err(DriverError::unsupported("write in monitor mode")),
        }
    }

    /// Apply changed parameters to an existing generic channel.
    ///
    /// Plain re-resolution keeps the old configuration; this closes the old
    /// handle and installs a freshly opened one.
    pub fn reconfigure(&self, attrs: &DeviceAttributes) -> Result<(), DriverError> {
        if attrs.mode != AccessMode::Generic {
            return Err(DriverError::unsupported("reconfigure outside generic mode"));
        }
        let channel = self
            .registry
            .reconfigure_generic(&generic_port_config(attrs));
        if channel.is_connected() {
            Ok(())
        } else {
            Err(PortError::unavailable(&attrs.device).into())
        }
    }

    /// A device was registered with the host. Channels stay lazy; nothing
    /// to do beyond noting it.
    pub fn device_added(&self, device: &str) {
        info!(%device, "device added");
    }

    /// A device's profile changed: stop its listener so stale state is not
    /// reused with the new parameters.
    pub fn device_updated(&self, device: &str) {
        info!(%device, "device updated");
        self.registry.stop_monitor(device);
    }

    /// A device was removed: stop its listener. The registry entry remains
    /// for a possible re-add.
    pub fn device_removed(&self, device: &str) {
        info!(%device, "device removed");
        self.registry.stop_monitor(device);
    }

    /// Stop all listeners and close all handles.
    pub fn shutdown(&self) {
        info!("driver shutdown");
        self.registry.shutdown();
    }
}

/// Generic-mode timeouts arrive in seconds on the wire.
fn generic_port_config(attrs: &DeviceAttributes) -> PortConfig {
    PortConfig::new(
        &attrs.device,
        attrs.baud_rate,
        Duration::from_secs(attrs.timeout),
    )
}

/// Convert an accumulated buffer into the declared value type.
fn convert_value(bytes: &[u8], kind: ValueKind) -> Result<CommandValue, DriverError> {
    match kind {
        ValueKind::Int8 => bytes
            .first()
            .map(|&b| CommandValue::Int8(b as i8))
            .ok_or_else(|| DriverError::InvalidPayload("response shorter than int8".into())),
        ValueKind::Int16 => {
            if bytes.len() < 2 {
                return Err(DriverError::InvalidPayload(
                    "response shorter than int16".into(),
                ));
            }
            Ok(CommandValue::Int16(i16::from_be_bytes([bytes[0], bytes[1]])))
        }
        ValueKind::Text => Ok(CommandValue::Text(hex::encode(bytes))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn defaults() -> DriverDefaults {
        DriverDefaults {
            baud_rate: 9600,
            timeout: 1,
            max_bytes: 128,
        }
    }

    #[test]
    fn attributes_parse_numbers_and_numeric_strings() {
        let value = json!({
            "type": "generic",
            "dev": "/dev/ttyS1",
            "baud": "115200",
            "timeout": 3,
            "maxbytes": "48",
        });
        let attrs = DeviceAttributes::from_value(&value, &defaults()).unwrap();
        assert_eq!(attrs.mode, AccessMode::Generic);
        assert_eq!(attrs.device, "/dev/ttyS1");
        assert_eq!(attrs.baud_rate, 115_200);
        assert_eq!(attrs.timeout, 3);
        assert_eq!(attrs.max_bytes, 48);
    }

    #[test]
    fn omitted_attributes_fall_back_to_defaults() {
        let value = json!({ "type": "monitor", "dev": "/dev/ttyS2" });
        let attrs = DeviceAttributes::from_value(&value, &defaults()).unwrap();
        assert_eq!(attrs.baud_rate, 9600);
        assert_eq!(attrs.timeout, 1);
        assert_eq!(attrs.max_bytes, 128);
    }

    #[test]
    fn unknown_mode_is_unsupported() {
        let value = json!({ "type": "i2c", "dev": "/dev/ttyS1" });
        let err = DeviceAttributes::from_value(&value, &defaults()).unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
    }

    #[test]
    fn missing_device_is_invalid() {
        let value = json!({ "type": "generic" });
        let err = DeviceAttributes::from_value(&value, &defaults()).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidAttribute { ref key, .. } if key == "dev"
        ));
    }

    #[test]
    fn garbage_numeric_attribute_is_invalid() {
        let value = json!({ "type": "generic", "dev": "/dev/ttyS1", "baud": "fast" });
        let err = DeviceAttributes::from_value(&value, &defaults()).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidAttribute { ref key, .. } if key == "baud"
        ));
    }

    #[test]
    fn value_conversion_covers_declared_kinds() {
        assert_eq!(
            convert_value(&[0xfe, 0x01], ValueKind::Int8).unwrap(),
            CommandValue::Int8(-2)
        );
        assert_eq!(
            convert_value(&[0x01, 0x02], ValueKind::Int16).unwrap(),
            CommandValue::Int16(0x0102)
        );
        assert_eq!(
            convert_value(&[0xde, 0xad], ValueKind::Text).unwrap(),
            CommandValue::Text("dead".into())
        );
    }

    #[test]
    fn short_buffers_fail_conversion() {
        assert!(convert_value(&[], ValueKind::Int8).is_err());
        assert!(convert_value(&[0x01], ValueKind::Int16).is_err());
    }

    #[test]
    fn value_kind_rejects_unknown_names() {
        assert!(ValueKind::parse("int8").is_ok());
        assert!(ValueKind::parse("float32").is_err());
    }

    #[test]
    fn transceiver_read_drains_last_exchange() {
        let driver = DeviceDriver::new(&Config::default());
        let attrs = DeviceAttributes {
            mode: AccessMode::Transceiver,
            device: "/dev/ttyS5".into(),
            baud_rate: 9600,
            timeout: 100,
            max_bytes: 128,
        };
        // No exchange yet: an empty hex string, not an error.
        let value = driver.handle_read(&attrs, ValueKind::Text).unwrap();
        assert_eq!(value, CommandValue::Text(String::new()));
    }

    #[test]
    fn monitor_write_is_unsupported() {
        let driver = DeviceDriver::new(&Config::default());
        let attrs = DeviceAttributes {
            mode: AccessMode::Monitor,
            device: "/dev/ttyS5".into(),
            baud_rate: 9600,
            timeout: 1,
            max_bytes: 128,
        };
        let err = driver.handle_write(&attrs, "00").unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
    }
}
