//! Layered configuration using Figment.
//!
//! Layers, later ones winning:
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. Optional TOML file
//! 3. Environment variables prefixed with `PMD401_`, nested keys joined by `__`
//! 4. Command-line overrides, applied by the binary
//!
//! # Environment Variables
//!
//! - `PMD401_EMULATOR__CHANNELS=8` sets `emulator.channels`
//! - `PMD401_CLIENT__REPLY_TIMEOUT_MS=500` sets `client.reply_timeout_ms`
//! - `PMD401_LOGGING__LEVEL=debug` sets `logging.level`

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pmd401_client::ClientConfig;
use pmd401_emu::EmulatorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{self, LoggingConfig};

pub const ENV_PREFIX: &str = "PMD401_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.emulator
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("emulator: {e}")))?;

        self.client
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("client: {e}")))?;

        if !logging::is_valid_level(&self.logging.level) {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' must be one of: trace, debug, info, warn, error",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = AppConfig::load_with_prefix(None, "PMD401_UNIT_DEFAULTS_").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.emulator.port, 4001);
        assert_eq!(config.client.encoder_mode, 6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[emulator]
channels = 8
tick_ms = 50

[client]
reply_timeout_ms = 500

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_with_prefix(Some(file.path()), "PMD401_UNIT_FILE_").unwrap();
        assert_eq!(config.emulator.channels, 8);
        assert_eq!(config.emulator.tick_ms, 50);
        // untouched keys keep their defaults
        assert_eq!(config.emulator.port, 4001);
        assert_eq!(config.client.reply_timeout_ms, 500);
        assert_eq!(config.client.idle_timeout_ms, 10_000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[emulator]\nchannels = 8").unwrap();

        std::env::set_var("PMD401_UNIT_ENV_EMULATOR__CHANNELS", "12");
        let config = AppConfig::load_with_prefix(Some(file.path()), "PMD401_UNIT_ENV_");
        std::env::remove_var("PMD401_UNIT_ENV_EMULATOR__CHANNELS");

        assert_eq!(config.unwrap().emulator.channels, 12);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/pmd401.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn validation() {
        let mut config = AppConfig::default();
        config.emulator.channels = 128;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.emulator.tick_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_ms"), "{err}");

        let mut config = AppConfig::default();
        config.client.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.emulator.channels = 127;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[emulator]\nchannels = \"many\"").unwrap();
        let err = AppConfig::load_with_prefix(Some(file.path()), "PMD401_UNIT_BAD_").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
