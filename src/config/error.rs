//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read configuration file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Failed to write config file
    #[error("failed to write configuration file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Environment variable parse error
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },

    /// Missing required configuration
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
}

impl ConfigError {
    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
