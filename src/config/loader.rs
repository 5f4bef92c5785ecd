//! Configuration loader with file resolution and environment overrides.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "UART_AGENT";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit config path
const CONFIG_PATH_ENV: &str = "UART_AGENT_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `UART_AGENT_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. the platform config directory (`~/.config/uart-device-agent/` on
    ///    Linux, the equivalents elsewhere)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override values from any source.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Env overrides apply even without a file.
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if a path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            self.config = load_from_file(path)?;
            apply_env_overrides(&mut self.config)?;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    if let Some(dir) = get_default_config_dir() {
        let app_config = dir.join(CONFIG_FILE_NAME);
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
}

/// Get the platform config directory for this service.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "uart-device-agent").map(|dirs| dirs.config_dir().to_path_buf())
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment variable overrides, pattern `UART_AGENT_<SECTION>_<KEY>`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_SERIAL_DEFAULT_BAUD")) {
        config.serial.default_baud = val.parse().map_err(|_| {
            ConfigError::env_parse(
                format!("{ENV_PREFIX}_SERIAL_DEFAULT_BAUD"),
                "invalid baud rate",
            )
        })?;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_SERIAL_DEFAULT_TIMEOUT")) {
        config.serial.default_timeout = val.parse().map_err(|_| {
            ConfigError::env_parse(
                format!("{ENV_PREFIX}_SERIAL_DEFAULT_TIMEOUT"),
                "invalid timeout",
            )
        })?;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_SERIAL_DEFAULT_MAX_BYTES")) {
        config.serial.default_max_bytes = val.parse().map_err(|_| {
            ConfigError::env_parse(
                format!("{ENV_PREFIX}_SERIAL_DEFAULT_MAX_BYTES"),
                "invalid byte count",
            )
        })?;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOG_LEVEL")) {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOG_FORMAT")) {
        config.logging.format = val.parse::<LogFormat>().map_err(|message| {
            ConfigError::env_parse(format!("{ENV_PREFIX}_LOG_FORMAT"), message)
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    #[test]
    #[serial]
    fn default_loader_uses_builtin_defaults() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 9600);
    }

    #[test]
    #[serial]
    fn env_override_wins() {
        env::set_var("UART_AGENT_SERIAL_DEFAULT_BAUD", "57600");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 57_600);

        env::remove_var("UART_AGENT_SERIAL_DEFAULT_BAUD");
    }

    #[test]
    #[serial]
    fn bad_env_value_is_reported() {
        env::set_var("UART_AGENT_SERIAL_DEFAULT_TIMEOUT", "soon");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));

        env::remove_var("UART_AGENT_SERIAL_DEFAULT_TIMEOUT");
    }

    #[test]
    #[serial]
    fn load_from_file_and_reload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\ndefault_baud = 19200").unwrap();

        let mut loader = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(loader.config().serial.default_baud, 19_200);

        writeln!(file, "default_max_bytes = 64").unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.config().serial.default_max_bytes, 64);
    }

    #[test]
    #[serial]
    fn save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let loader = ConfigLoader::with_defaults();
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(
            reloaded.config().serial.default_baud,
            loader.config().serial.default_baud
        );
    }
}
