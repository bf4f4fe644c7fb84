//! HTTP API server with Kubernetes-friendly lifecycle management.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use error::ServerError;
pub use health::ReadinessGate;
pub use http::{OngoingWork, Pipeline};
pub use lifecycle::{LifecycleState, RunningServer, Server, ShutdownTimings, ShutdownTrigger};
