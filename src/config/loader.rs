//! Configuration loading from disk, environment and command line.

use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, LogLevel, ParseLogLevelError, ServerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    LogLevel(#[from] ParseLogLevelError),
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line or through the environment.
///
/// Every field is optional; `None` leaves the file or default value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub probe_period_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_show_source: Option<bool>,
    pub allow_privileged_user: Option<bool>,
    pub metrics_port: Option<u16>,
}

impl ConfigOverrides {
    /// Apply the overrides on top of `config`.
    pub fn apply(self, mut config: ServerConfig) -> Result<ServerConfig, ConfigError> {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(period) = self.probe_period_secs {
            config.probe_period_secs = period;
        }
        if let Some(level) = self.log_level {
            config.log_level = level.parse::<LogLevel>()?;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(show) = self.log_show_source {
            config.log_show_source = show;
        }
        if let Some(allow) = self.allow_privileged_user {
            config.allow_privileged_user = allow;
        }
        if self.metrics_port.is_some() {
            config.metrics_port = self.metrics_port;
        }
        Ok(config)
    }
}

/// Load configuration from a TOML file without validating it.
pub fn load_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve the final configuration: defaults, then the optional file, then
/// overrides. The result is validated before it is returned.
pub fn load_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<ServerConfig, ConfigError> {
    let base = match path {
        Some(path) => load_file(path)?,
        None => ServerConfig::default(),
    };
    let config = overrides.apply(base)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
