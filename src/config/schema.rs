//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial defaults applied when a command omits an attribute
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial defaults section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate used when a command carries no `baud` attribute
    pub default_baud: u32,
    /// Timeout used when a command carries no `timeout` attribute,
    /// interpreted in the mode's wire unit (seconds for generic,
    /// milliseconds for transceiver)
    pub default_timeout: u64,
    /// Upper bound on a generic read when `maxbytes` is absent
    pub default_max_bytes: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 9600,
            default_timeout: 1,
            default_max_bytes: 128,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty", "compact", "json"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
