//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → privilege.rs (refuse root unless allowed)
//!     → bind listener
//! ```

pub mod privilege;

pub use privilege::{check_unprivileged, IdentityProbe, PrivilegeError, ProcessIdentity, SystemIdentity};
