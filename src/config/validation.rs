//! Configuration validation.
//!
//! Serde handles syntactic checks; this module handles the semantic ones.
//! Validation is a pure function that reports every problem, not just the
//! first.

use crate::config::schema::ServerConfig;

/// Longest probe period accepted, in seconds.
pub const MAX_PROBE_PERIOD_SECS: u64 = 3600;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The probe period would delay shutdown unreasonably.
    #[error("probe_period_secs = {0} exceeds the maximum of {MAX_PROBE_PERIOD_SECS}")]
    ProbePeriodTooLong(u64),
    /// Metrics exporter and HTTP listener cannot share a port.
    #[error("metrics_port {0} is already used by the HTTP listener")]
    MetricsPortConflict(u16),
}

/// Check a configuration for semantic problems.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.probe_period_secs > MAX_PROBE_PERIOD_SECS {
        errors.push(ValidationError::ProbePeriodTooLong(config.probe_period_secs));
    }

    if let Some(metrics_port) = config.metrics_port {
        if metrics_port == config.port && metrics_port != 0 {
            errors.push(ValidationError::MetricsPortConflict(metrics_port));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
