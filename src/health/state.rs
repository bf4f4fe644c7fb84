//! Readiness state shared between the probe handler and the shutdown path.
//!
//! # States
//! - Ready: the load balancer may route new traffic here
//! - Shutting down: the probe fails so the load balancer drains us
//!
//! # State Transitions
//! ```text
//! Ready → Shutting down: mark_not_ready(), exactly once per server
//! ```
//! There is no way back; shutdown is one-way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way readiness flag.
///
/// Cloning is cheap and every clone observes the same flag. Reads and
/// writes are single atomic operations, so neither side ever blocks.
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate {
    shutting_down: Arc<AtomicBool>,
}

impl ReadinessGate {
    /// Create a gate in the ready state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the gate to not-ready.
    ///
    /// Idempotent. Returns `true` only for the call that performed the flip.
    pub fn mark_not_ready(&self) -> bool {
        let flipped = !self.shutting_down.swap(true, Ordering::SeqCst);
        if flipped {
            crate::observability::metrics::record_ready(false);
            tracing::info!("Readiness gate closed");
        }
        flipped
    }

    /// Whether the probe should report healthy.
    pub fn is_ready(&self) -> bool {
        !self.shutting_down.load(Ordering::SeqCst)
    }
}
