//! Listener ownership and the serve task.
//!
//! # Responsibilities
//! - Run the accept loop on its own task
//! - Report how that task ended when it ends on its own
//! - Execute the bounded graceful shutdown when told to
//! - Own the "ongoing work" token and the lifecycle state
//!
//! `ServerLifecycle` never decides *when* to shut down; the orchestrator in
//! `shutdown.rs` drives it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::http::conn;
use crate::lifecycle::state::{LifecycleState, StateCell, TransitionError};

/// Error type for lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Could not bind the listening socket.
    #[error("listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Could not read the bound address back from the listener.
    #[error("read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
    /// Could not install signal handlers.
    #[error("register signal handlers: {0}")]
    Signal(#[source] std::io::Error),
    /// The accept loop ended before shutdown was requested.
    #[error("HTTP server: {0}")]
    Serve(#[from] ServeFailure),
    /// In-flight requests outlived the graceful budget.
    #[error("server shutdown: graceful budget of {0:?} exceeded")]
    ShutdownTimeout(Duration),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// How the serve task ended on its own.
#[derive(Debug, thiserror::Error)]
pub enum ServeFailure {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("serve task panicked: {0}")]
    Panicked(String),
    #[error("serve task was cancelled")]
    Cancelled,
    #[error("accept loop exited unexpectedly")]
    Exited,
}

/// A bound, serving HTTP listener and its lifecycle state.
pub struct ServerLifecycle {
    local_addr: SocketAddr,
    state: Arc<StateCell>,
    ongoing: CancellationToken,
    stop_accepting: CancellationToken,
    serve_task: JoinHandle<std::io::Result<()>>,
}

impl ServerLifecycle {
    /// Start serving `router` on `listener`.
    ///
    /// Every request handler runs with `ongoing` reachable through the
    /// pipeline; it is canceled once, at the end of shutdown. Clients that
    /// take longer than `read_header_timeout` to send a request head are
    /// disconnected.
    pub fn start(
        listener: TcpListener,
        router: Router,
        ongoing: CancellationToken,
        read_header_timeout: Duration,
    ) -> Result<Self, LifecycleError> {
        let local_addr = listener.local_addr().map_err(LifecycleError::LocalAddr)?;

        Ok(Self::spawn(local_addr, ongoing, move |stop| {
            conn::serve(listener, router, read_header_timeout, stop)
        }))
    }

    /// Spawn an arbitrary accept loop. `serve` receives the token that asks
    /// it to stop accepting and drain.
    pub(crate) fn spawn<F, Fut>(local_addr: SocketAddr, ongoing: CancellationToken, serve: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let stop_accepting = CancellationToken::new();
        let serve_task = tokio::spawn(serve(stop_accepting.clone()));

        tracing::info!(address = %local_addr, "HTTP server run");

        Self {
            local_addr,
            state: Arc::new(StateCell::new()),
            ongoing,
            stop_accepting,
            serve_task,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Resolve when the serve task ends without having been asked to.
    ///
    /// Cancel safe: dropping the future leaves the task running.
    pub(crate) async fn serve_failed(&mut self) -> ServeFailure {
        match (&mut self.serve_task).await {
            Ok(Ok(())) => ServeFailure::Exited,
            Ok(Err(err)) => ServeFailure::Io(err),
            Err(join) if join.is_panic() => {
                ServeFailure::Panicked(crate::http::middleware::panic::panic_message(
                    join.into_panic().as_ref(),
                ))
            }
            Err(_) => ServeFailure::Cancelled,
        }
    }

    pub(crate) fn enter(&self, state: LifecycleState) -> Result<(), LifecycleError> {
        self.state.transition(state)?;
        Ok(())
    }

    /// Stop accepting and wait up to `budget` for in-flight requests.
    ///
    /// Moves the lifecycle into `ShuttingDown`. Returns `Ok(())` if the
    /// accept loop drained in time, whatever its own exit status.
    pub(crate) async fn shutdown(&mut self, budget: Duration) -> Result<(), LifecycleError> {
        self.enter(LifecycleState::ShuttingDown)?;
        self.stop_accepting.cancel();

        match tokio::time::timeout(budget, &mut self.serve_task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => {
                tracing::warn!(error = %err, "Accept loop reported an error while draining");
                Ok(())
            }
            Ok(Err(join)) => {
                tracing::warn!(error = %join, "Serve task ended abnormally while draining");
                Ok(())
            }
            Err(_) => Err(LifecycleError::ShutdownTimeout(budget)),
        }
    }

    /// Cancel the shared "ongoing work" token.
    pub(crate) fn cancel_ongoing(&self) {
        self.ongoing.cancel();
    }

    /// Tear down the accept loop and every open connection without waiting.
    pub(crate) fn abort(&self) {
        self.serve_task.abort();
    }
}
