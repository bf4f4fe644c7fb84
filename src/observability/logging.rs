//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Map the configured level onto an `EnvFilter` (`RUST_LOG` still wins)
//! - Pick JSON or human-readable output
//!
//! # Design Decisions
//! - JSON by default for machine parsing
//! - Source location is opt-in; it bloats every line

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogLevel};

/// Error returned when a global subscriber is already installed.
#[derive(Debug, thiserror::Error)]
#[error("install log subscriber: {0}")]
pub struct LoggingError(#[from] tracing_subscriber::util::TryInitError);

/// Options for [`init`], taken from `ServerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    pub level: LogLevel,
    pub format: LogFormat,
    pub show_source: bool,
}

/// Build the filter used when `RUST_LOG` is not set.
pub fn default_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::new(format!(
        "{crate_level},tower_http={crate_level}",
        crate_level = level.as_str()
    ))
}

/// Install the global subscriber.
pub fn init(options: LogOptions) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(options.level));

    let registry = tracing_subscriber::registry().with(filter);

    match options.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_file(options.show_source)
                    .with_line_number(options.show_source),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(options.show_source)
                    .with_line_number(options.show_source),
            )
            .try_init()?,
    }

    Ok(())
}
