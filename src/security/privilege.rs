//! Process identity checks.
//!
//! # Responsibilities
//! - Read the effective identity of the running process
//! - Refuse to serve as root unless explicitly allowed
//!
//! # Design Decisions
//! - Identity lookup sits behind a trait so startup can be tested without
//!   running as root
//! - Username, UID and GID are each checked; any one being root fails

#[cfg(unix)]
use std::ffi::CStr;

/// Effective identity of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub uid: u32,
    pub gid: u32,
    pub username: Option<String>,
}

/// Source of the current process identity.
pub trait IdentityProbe: Send + Sync {
    fn current(&self) -> Result<ProcessIdentity, PrivilegeError>;
}

/// Error type for identity checks.
#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    #[error("server runs as root: {0}")]
    Root(RootReason),
    #[error("get user: {0}")]
    Lookup(String),
}

/// Which part of the identity is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RootReason {
    #[error("username root")]
    Username,
    #[error("UID(0)")]
    Uid,
    #[error("GID(0)")]
    Gid,
}

/// Reads identity from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

/// Upper bound for the passwd lookup buffer.
#[cfg(unix)]
const MAX_PASSWD_BUFFER: usize = 1 << 20;

#[cfg(unix)]
impl IdentityProbe for SystemIdentity {
    fn current(&self) -> Result<ProcessIdentity, PrivilegeError> {
        // SAFETY: geteuid/getegid cannot fail and touch no memory.
        let uid = unsafe { libc::geteuid() };
        let gid = unsafe { libc::getegid() };

        Ok(ProcessIdentity {
            uid: uid as u32,
            gid: gid as u32,
            username: lookup_username(uid)?,
        })
    }
}

/// Name of the passwd entry for `uid`, if there is one.
///
/// Uses the reentrant `getpwuid_r` with a buffer owned by this call, so
/// concurrent lookups from runtime workers do not share static storage.
#[cfg(unix)]
fn lookup_username(uid: libc::uid_t) -> Result<Option<String>, PrivilegeError> {
    let mut buf: Vec<libc::c_char> = vec![0; 1024];

    loop {
        // SAFETY: passwd is plain old data; all-zero is a valid value.
        let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
        let mut found: *mut libc::passwd = std::ptr::null_mut();

        // SAFETY: every pointer refers to storage owned by this frame and
        // `buf.len()` is the true capacity of `buf`.
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut entry, buf.as_mut_ptr(), buf.len(), &mut found)
        };

        if rc == libc::ERANGE && buf.len() < MAX_PASSWD_BUFFER {
            let grown = buf.len() * 2;
            buf.resize(grown, 0);
            continue;
        }
        if rc != 0 {
            return Err(PrivilegeError::Lookup(
                std::io::Error::from_raw_os_error(rc).to_string(),
            ));
        }
        if found.is_null() || entry.pw_name.is_null() {
            return Ok(None);
        }

        // SAFETY: pw_name points into `buf`, NUL-terminated by getpwuid_r,
        // and `buf` outlives this borrow.
        let name = unsafe { CStr::from_ptr(entry.pw_name) };
        return Ok(Some(name.to_string_lossy().into_owned()));
    }
}

#[cfg(not(unix))]
impl IdentityProbe for SystemIdentity {
    fn current(&self) -> Result<ProcessIdentity, PrivilegeError> {
        Err(PrivilegeError::Lookup(
            "process identity is only available on unix".to_string(),
        ))
    }
}

/// Fail if the identity reported by `probe` is privileged.
pub fn check_unprivileged(probe: &dyn IdentityProbe) -> Result<(), PrivilegeError> {
    let identity = probe.current()?;

    if identity.username.as_deref() == Some("root") {
        return Err(PrivilegeError::Root(RootReason::Username));
    }
    if identity.uid == 0 {
        return Err(PrivilegeError::Root(RootReason::Uid));
    }
    if identity.gid == 0 {
        return Err(PrivilegeError::Root(RootReason::Gid));
    }

    Ok(())
}
