//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use api_server::security::{IdentityProbe, PrivilegeError, ProcessIdentity};
use api_server::{RunningServer, Server, ServerConfig, ShutdownTimings};
use axum::Router;

/// Identity of an ordinary user, so tests pass when run as root.
pub struct Unprivileged;

impl IdentityProbe for Unprivileged {
    fn current(&self) -> Result<ProcessIdentity, PrivilegeError> {
        Ok(ProcessIdentity {
            uid: 1000,
            gid: 1000,
            username: Some("app".into()),
        })
    }
}

/// Short timings so shutdown paths finish in about a second.
pub fn fast_timings() -> ShutdownTimings {
    ShutdownTimings::default()
        .with_drain_margin(Duration::from_millis(200))
        .with_graceful_budget(Duration::from_secs(1))
        .with_hard_budget(Duration::from_millis(200))
}

/// Request-head deadline used by test servers.
pub const HEADER_TIMEOUT: Duration = Duration::from_millis(300);

/// Bind a server on an ephemeral port with the given routes.
pub async fn start_server(routes: Router, probe_period_secs: u64) -> RunningServer {
    let config = ServerConfig {
        port: 0,
        probe_period_secs,
        ..ServerConfig::default()
    };
    Server::new(config)
        .with_identity(Unprivileged)
        .with_timings(fast_timings())
        .with_read_header_timeout(HEADER_TIMEOUT)
        .with_routes(routes)
        .bind()
        .await
        .expect("server should bind")
}

/// Base URL reaching `server` over loopback.
pub fn base_url(server: &RunningServer) -> String {
    let port = server.local_addr().port();
    format!("http://{}", SocketAddr::from(([127, 0, 0, 1], port)))
}

/// Client that opens a fresh connection for every request.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
