//! Configuration schema definitions.
//!
//! All types derive Serde traits so a TOML file can supply any subset of
//! fields; anything missing falls back to the defaults below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default readiness probe period, matching the Kubernetes default.
pub const DEFAULT_PROBE_PERIOD_SECS: u64 = 10;

/// Root configuration for the server.
///
/// Read once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port the HTTP listener binds on all interfaces.
    pub port: u16,

    /// `readinessProbe.periodSeconds` of the pod running this server.
    ///
    /// See <https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/pod-v1/#Probe>.
    pub probe_period_secs: u64,

    /// Minimum level of emitted log events.
    pub log_level: LogLevel,

    /// Output encoding of log events.
    pub log_format: LogFormat,

    /// Record source file and line with every log event.
    pub log_show_source: bool,

    /// Allow the process to run with superuser identity.
    pub allow_privileged_user: bool,

    /// Port for the Prometheus scrape endpoint. Disabled when absent.
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            probe_period_secs: DEFAULT_PROBE_PERIOD_SECS,
            log_level: LogLevel::Info,
            log_format: LogFormat::Json,
            log_show_source: false,
            allow_privileged_user: false,
            metrics_port: None,
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a log level string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level {0:?} (expected trace, debug, info, warn or error)")]
pub struct ParseLogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ParseLogLevelError;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation.
    #[default]
    Json,
    /// Human-readable lines, for local development.
    Pretty,
}
