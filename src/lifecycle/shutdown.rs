//! Shutdown orchestration.
//!
//! # Sequence
//! ```text
//! select { shutdown requested, serve failed }
//!   serve failed → cancel ongoing work → Failed (no drain)
//!   requested    → Draining
//!                → readiness gate closed
//!                → sleep drain_margin + probe period
//!                → ShuttingDown (stop accepting, wait ≤ graceful_budget)
//!                → cancel ongoing work
//!                → Stopped | sleep hard_budget → Failed
//! ```
//! The gate is closed strictly before the drain sleep, and the sleep ends
//! strictly before the listener stops accepting. Reordering opens a window
//! where the load balancer routes to a socket that is no longer accepting.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::health::ReadinessGate;
use crate::lifecycle::server::{LifecycleError, ServerLifecycle};
use crate::lifecycle::state::LifecycleState;

/// Extra wait on top of the probe period before the listener stops.
pub const DRAIN_MARGIN: Duration = Duration::from_secs(1);

/// Time in-flight requests get to finish once the listener stops.
pub const GRACEFUL_BUDGET: Duration = Duration::from_secs(15);

/// Grace for abruptly terminated connections to flush after a timeout.
pub const HARD_BUDGET: Duration = Duration::from_secs(3);

/// Durations driving the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimings {
    pub drain_margin: Duration,
    pub graceful_budget: Duration,
    pub hard_budget: Duration,
}

impl Default for ShutdownTimings {
    fn default() -> Self {
        Self {
            drain_margin: DRAIN_MARGIN,
            graceful_budget: GRACEFUL_BUDGET,
            hard_budget: HARD_BUDGET,
        }
    }
}

impl ShutdownTimings {
    pub fn with_drain_margin(mut self, margin: Duration) -> Self {
        self.drain_margin = margin;
        self
    }

    pub fn with_graceful_budget(mut self, budget: Duration) -> Self {
        self.graceful_budget = budget;
        self
    }

    pub fn with_hard_budget(mut self, budget: Duration) -> Self {
        self.hard_budget = budget;
        self
    }

    /// Wait between closing the readiness gate and stopping the listener.
    pub fn drain_delay(&self, probe_period: Duration) -> Duration {
        self.drain_margin + probe_period
    }
}

/// Manual shutdown trigger.
///
/// Cloneable and idempotent; any number of `trigger` calls request one
/// shutdown. Useful for embedding the server and in tests.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    token: CancellationToken,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future resolving once `trigger` has been called.
    pub fn triggered(&self) -> impl Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }
}

/// Drives a [`ServerLifecycle`] from Running to a terminal state.
#[derive(Debug, Clone)]
pub struct ShutdownOrchestrator {
    readiness: ReadinessGate,
    probe_period: Duration,
    timings: ShutdownTimings,
}

impl ShutdownOrchestrator {
    pub fn new(readiness: ReadinessGate, probe_period: Duration, timings: ShutdownTimings) -> Self {
        Self {
            readiness,
            probe_period,
            timings,
        }
    }

    pub fn drain_delay(&self) -> Duration {
        self.timings.drain_delay(self.probe_period)
    }

    /// Run until `shutdown` resolves or the server fails, then take the
    /// server through the shutdown sequence.
    ///
    /// `shutdown` is dropped as soon as the race is decided, so later
    /// signals cannot start a second sequence.
    pub async fn run<F>(self, mut server: ServerLifecycle, shutdown: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown initiated");
            }
            failure = server.serve_failed() => {
                tracing::error!(error = %failure, "HTTP server");
                server.cancel_ongoing();
                server.enter(LifecycleState::Failed)?;
                return Err(failure.into());
            }
        }

        server.enter(LifecycleState::Draining)?;
        self.readiness.mark_not_ready();

        let delay = self.drain_delay();
        tracing::info!(
            delay_secs = delay.as_secs_f64(),
            "Wait for readiness probe to mark instance NotReady"
        );
        tokio::time::sleep(delay).await;

        let started = Instant::now();
        let outcome = server.shutdown(self.timings.graceful_budget).await;
        server.cancel_ongoing();

        match outcome {
            Ok(()) => {
                server.enter(LifecycleState::Stopped)?;
                tracing::info!(drained_in = ?started.elapsed(), "Quit");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Server shutdown failed");
                tokio::time::sleep(self.timings.hard_budget).await;
                server.abort();
                server.enter(LifecycleState::Failed)?;
                Err(err)
            }
        }
    }
}
