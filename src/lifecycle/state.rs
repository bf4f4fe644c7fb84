//! Server lifecycle state machine.
//!
//! # States
//! ```text
//! Running ──signal──▶ Draining ──▶ ShuttingDown ──▶ Stopped
//!    │                                  │
//!    └──serve failed──▶ Failed ◀──timeout┘
//! ```
//! Transitions only move forward; no state is entered twice.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Listener bound and serving.
    Running = 0,
    /// Readiness revoked, waiting for load balancers to notice.
    Draining = 1,
    /// No new connections; in-flight requests finishing.
    ShuttingDown = 2,
    /// Clean exit.
    Stopped = 3,
    /// Serve error or shutdown timeout.
    Failed = 4,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Running, Draining)
                | (Running, Failed)
                | (Draining, ShuttingDown)
                | (ShuttingDown, Stopped)
                | (ShuttingDown, Failed)
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Running,
            1 => LifecycleState::Draining,
            2 => LifecycleState::ShuttingDown,
            3 => LifecycleState::Stopped,
            _ => LifecycleState::Failed,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Atomic holder of the current [`LifecycleState`].
///
/// Changes are also published on a watch channel so other tasks can wait
/// for a particular state.
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
    tx: watch::Sender<LifecycleState>,
}

impl StateCell {
    /// New cell in `Running`.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Running);
        Self {
            state: AtomicU8::new(LifecycleState::Running as u8),
            tx,
        }
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move to `to`, failing if that is not a forward edge from the current
    /// state.
    pub fn transition(&self, to: LifecycleState) -> Result<(), TransitionError> {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            let from = LifecycleState::from_u8(current);
            if !from.can_transition_to(to) {
                return Err(TransitionError { from, to });
            }
            match self.state.compare_exchange(
                current,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    tracing::info!(from = %from, to = %to, "Lifecycle transition");
                    metrics::record_transition(to.as_str());
                    self.tx.send_replace(to);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    const ALL: [LifecycleState; 5] = [Running, Draining, ShuttingDown, Stopped, Failed];

    #[test]
    fn starts_running() {
        assert_eq!(StateCell::new().get(), Running);
    }

    #[test]
    fn clean_path() {
        let cell = StateCell::new();
        cell.transition(Draining).unwrap();
        cell.transition(ShuttingDown).unwrap();
        cell.transition(Stopped).unwrap();
        assert_eq!(cell.get(), Stopped);
    }

    #[test]
    fn serve_failure_skips_drain() {
        let cell = StateCell::new();
        cell.transition(Failed).unwrap();
        assert_eq!(
            cell.transition(Draining),
            Err(TransitionError { from: Failed, to: Draining })
        );
    }

    #[test]
    fn no_state_is_revisited() {
        let cell = StateCell::new();
        cell.transition(Draining).unwrap();
        assert!(cell.transition(Draining).is_err());
        assert!(cell.transition(Running).is_err());
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for terminal in [Stopped, Failed] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn round_trips_through_u8() {
        for state in ALL {
            assert_eq!(LifecycleState::from_u8(state as u8), state);
        }
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        cell.transition(Failed).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Failed);
    }

    #[test]
    fn racing_transitions_commit_once() {
        let cell = std::sync::Arc::new(StateCell::new());
        let handles: Vec<_> = [Draining, Failed, Draining, Failed]
            .into_iter()
            .map(|to| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.transition(to).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        // Draining then Failed is not an edge, nor is a repeat.
        assert_eq!(wins, 1);
    }
}
