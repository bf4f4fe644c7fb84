//! Health probe subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (lifecycle/shutdown.rs):
//!     Shutdown begins
//!     → state.rs: mark_not_ready()
//!
//! Load balancer probe:
//!     GET /healthz
//!     → endpoint.rs reads state.rs
//!     → 200 "OK" | 503 "shutting down"
//! ```
//!
//! # Design Decisions
//! - Readiness lives on the server instance, not in a global
//! - The flag is atomic; probes never contend with the orchestrator

pub mod endpoint;
pub mod state;

pub use endpoint::{healthz, HEALTHZ_PATH};
pub use state::ReadinessGate;
