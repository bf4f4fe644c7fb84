//! Startup orchestration.
//!
//! # Responsibilities
//! - Refuse to run as root unless allowed
//! - Initialize subsystems in dependency order
//! - Bind the listener last, then hand over to the orchestrator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and returned, never retried
//! - Configuration arrives already validated

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::ReadinessGate;
use crate::http::{Pipeline, READ_HEADER_TIMEOUT};
use crate::lifecycle::server::{LifecycleError, ServerLifecycle};
use crate::lifecycle::shutdown::{ShutdownOrchestrator, ShutdownTimings};
use crate::lifecycle::signals;
use crate::lifecycle::state::LifecycleState;
use crate::observability::metrics;
use crate::security::{check_unprivileged, IdentityProbe, SystemIdentity};

/// An HTTP server that has not started yet.
pub struct Server {
    config: ServerConfig,
    routes: Router,
    timings: ShutdownTimings,
    read_header_timeout: Duration,
    identity: Box<dyn IdentityProbe>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Router::new(),
            timings: ShutdownTimings::default(),
            read_header_timeout: READ_HEADER_TIMEOUT,
            identity: Box::new(SystemIdentity),
        }
    }

    /// Register application routes alongside `/healthz`.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    pub fn with_timings(mut self, timings: ShutdownTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Override how long clients get to send a request head.
    pub fn with_read_header_timeout(mut self, timeout: Duration) -> Self {
        self.read_header_timeout = timeout;
        self
    }

    /// Replace the source of the process identity used by the root check.
    pub fn with_identity(mut self, identity: impl IdentityProbe + 'static) -> Self {
        self.identity = Box::new(identity);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check identity, bind the listener and start serving.
    pub async fn bind(self) -> Result<RunningServer, ServerError> {
        if let Err(err) = check_unprivileged(self.identity.as_ref()) {
            if !self.config.allow_privileged_user {
                return Err(err.into());
            }
            tracing::warn!(error = %err, "Server run as root");
        }

        tracing::info!(
            http.port = self.config.port,
            http.probe_period_secs = self.config.probe_period_secs,
            log.level = %self.config.log_level,
            "init"
        );

        if let Some(port) = self.config.metrics_port {
            metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], port)))?;
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| LifecycleError::Bind { addr, source })?;

        let readiness = ReadinessGate::new();
        let ongoing = CancellationToken::new();
        let router = Pipeline::new(readiness.clone(), ongoing.clone())
            .with_routes(self.routes)
            .build();

        let lifecycle = ServerLifecycle::start(listener, router, ongoing, self.read_header_timeout)?;
        metrics::record_ready(true);

        let orchestrator = ShutdownOrchestrator::new(
            readiness.clone(),
            Duration::from_secs(self.config.probe_period_secs),
            self.timings,
        );

        Ok(RunningServer {
            lifecycle,
            orchestrator,
            readiness,
        })
    }

    /// Bind and serve until SIGTERM or SIGINT, then shut down.
    ///
    /// Signal handlers are installed before the listener is bound, so a
    /// signal arriving once the port answers is never missed.
    pub async fn run(self) -> Result<(), ServerError> {
        let termination = signals::termination().map_err(LifecycleError::Signal)?;
        self.bind().await?.run_until(termination).await
    }
}

/// A bound server in the `Running` state.
pub struct RunningServer {
    lifecycle: ServerLifecycle,
    orchestrator: ShutdownOrchestrator,
    readiness: ReadinessGate,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.lifecycle.local_addr()
    }

    pub fn readiness(&self) -> ReadinessGate {
        self.readiness.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Serve until SIGTERM or SIGINT, then shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let termination = signals::termination().map_err(LifecycleError::Signal)?;
        self.run_until(termination).await
    }

    /// Serve until `shutdown` resolves, then shut down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        self.orchestrator
            .run(self.lifecycle, shutdown)
            .await
            .map_err(ServerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{PrivilegeError, ProcessIdentity};

    struct Root;

    impl IdentityProbe for Root {
        fn current(&self) -> Result<ProcessIdentity, PrivilegeError> {
            Ok(ProcessIdentity {
                uid: 0,
                gid: 0,
                username: Some("root".into()),
            })
        }
    }

    struct Unprivileged;

    impl IdentityProbe for Unprivileged {
        fn current(&self) -> Result<ProcessIdentity, PrivilegeError> {
            Ok(ProcessIdentity {
                uid: 1000,
                gid: 1000,
                username: Some("app".into()),
            })
        }
    }

    fn ephemeral() -> ServerConfig {
        ServerConfig {
            port: 0,
            probe_period_secs: 0,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn root_is_refused_by_default() {
        let err = Server::new(ephemeral())
            .with_identity(Root)
            .bind()
            .await
            .err()
            .expect("root must be refused");
        assert!(matches!(err, ServerError::Privilege(_)));
    }

    #[tokio::test]
    async fn root_is_allowed_with_override() {
        let config = ServerConfig {
            allow_privileged_user: true,
            ..ephemeral()
        };
        let server = Server::new(config).with_identity(Root).bind().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Running);
        server.run_until(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn port_in_use_fails_without_drain() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let config = ServerConfig {
            port: taken.local_addr().unwrap().port(),
            ..ephemeral()
        };
        let err = Server::new(config)
            .with_identity(Unprivileged)
            .bind()
            .await
            .err()
            .expect("bind must fail");
        assert!(matches!(err, ServerError::Lifecycle(LifecycleError::Bind { .. })));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn binds_and_stops_cleanly() {
        let timings = ShutdownTimings::default().with_drain_margin(Duration::from_millis(10));
        let server = Server::new(ephemeral())
            .with_identity(Unprivileged)
            .with_timings(timings)
            .bind()
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        let readiness = server.readiness();
        let mut states = server.subscribe();

        server.run_until(async {}).await.unwrap();
        assert!(!readiness.is_ready());
        assert_eq!(*states.borrow_and_update(), LifecycleState::Stopped);
    }
}
