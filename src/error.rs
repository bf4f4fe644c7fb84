//! Top-level error type.
//!
//! Wraps every subsystem error with the phase that failed. Only the binary
//! turns these into process exit codes.

use crate::config::ConfigError;
use crate::lifecycle::LifecycleError;
use crate::observability::logging::LoggingError;
use crate::security::PrivilegeError;

/// Exit code for configuration and logging setup failures.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when refusing to run as root.
pub const EXIT_PRIVILEGE: u8 = 3;
/// Exit code for listen, accept and signal registration failures.
pub const EXIT_SERVE: u8 = 4;
/// Exit code when in-flight requests outlived the graceful budget.
pub const EXIT_SHUTDOWN_TIMEOUT: u8 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("logging: {0}")]
    Logging(#[from] LoggingError),
    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("startup: {0}")]
    Privilege(#[from] PrivilegeError),
    #[error("run: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl ServerError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServerError::Config(_) | ServerError::Logging(_) | ServerError::Metrics(_) => {
                EXIT_CONFIG
            }
            ServerError::Privilege(_) => EXIT_PRIVILEGE,
            ServerError::Lifecycle(LifecycleError::ShutdownTimeout(_)) => EXIT_SHUTDOWN_TIMEOUT,
            ServerError::Lifecycle(_) => EXIT_SERVE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ParseLogLevelError;
    use crate::security::privilege::RootReason;
    use std::time::Duration;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let cases = [
            ServerError::Config(ConfigError::LogLevel(ParseLogLevelError("x".into()))),
            ServerError::Privilege(PrivilegeError::Root(RootReason::Uid)),
            ServerError::Lifecycle(LifecycleError::Signal(std::io::Error::other("no"))),
            ServerError::Lifecycle(LifecycleError::ShutdownTimeout(Duration::from_secs(15))),
        ];
        let codes: Vec<u8> = cases.iter().map(ServerError::exit_code).collect();
        assert_eq!(codes, vec![2, 3, 4, 5]);
    }

    #[test]
    fn messages_name_the_phase() {
        let err = ServerError::Lifecycle(LifecycleError::ShutdownTimeout(Duration::from_secs(15)));
        assert_eq!(err.to_string(), "run: server shutdown: graceful budget of 15s exceeded");

        let err = ServerError::Privilege(PrivilegeError::Root(RootReason::Gid));
        assert_eq!(err.to_string(), "startup: server runs as root: GID(0)");
    }
}
