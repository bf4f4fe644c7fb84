//! Request interceptors.
//!
//! Applied to every request, outermost first:
//! ```text
//! panic.rs (contain panics → 500)
//!     → logging.rs (one info event, request span)
//!     → headers.rs (fixed response headers)
//!     → route dispatch
//! ```
//! The order is load-bearing: anything outside panic containment could
//! take the serving task down with it.

pub mod headers;
pub mod logging;
pub mod panic;

pub use logging::log_request;
