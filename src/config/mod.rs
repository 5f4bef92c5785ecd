//! TOML-based configuration with environment variable overrides.
//!
//! Resolution order: the `UART_AGENT_CONFIG` environment variable, then
//! `./config.toml`, then the platform config directory, then built-in
//! defaults. Any value can be overridden with `UART_AGENT_<SECTION>_<KEY>`
//! variables, e.g. `UART_AGENT_SERIAL_DEFAULT_BAUD=115200`.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_dir, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
