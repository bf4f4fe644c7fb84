//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Check identity → Build pipeline → Bind listener → Running
//!
//! Serving (server.rs):
//!     Accept loop on its own task, ongoing-work token shared by handlers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Not ready → Drain delay → Stop accepting
//!     → Wait (bounded) → Cancel ongoing work → Stopped | Failed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: identity, then pipeline, then listener
//! - Ordered shutdown: readiness first, listener last
//! - Shutdown has a deadline: failure is reported after graceful + hard budget
//! - State (state.rs) only moves forward

pub mod server;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use server::{LifecycleError, ServeFailure, ServerLifecycle};
pub use shutdown::{ShutdownOrchestrator, ShutdownTimings, ShutdownTrigger};
pub use startup::{RunningServer, Server};
pub use state::{LifecycleState, StateCell};
