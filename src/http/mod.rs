//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (accepted by conn.rs, header read deadline)
//!     → middleware/panic.rs (catch panics)
//!     → middleware/logging.rs (request event + span)
//!     → middleware/headers.rs (Server header)
//!     → server.rs router (/healthz + application routes)
//! ```

pub mod conn;
pub mod middleware;
pub mod server;

pub use conn::READ_HEADER_TIMEOUT;
pub use server::{OngoingWork, Pipeline};
