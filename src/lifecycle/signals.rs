//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers up front, so registration errors
//!   surface at startup rather than at shutdown
//! - Resolve once when either signal arrives
//! - Exit immediately on a second signal while shutdown is in progress
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Tokio never restores the default disposition, so the second signal is
//!   handled explicitly: the process exits with `128 + signo`, the status a
//!   shell reports for a process killed by that signal
//! - No other signals are handled

use std::future::Future;

/// Register termination handlers and return a future resolving on the
/// first SIGTERM or SIGINT.
#[cfg(unix)]
pub fn termination() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        let first = tokio::select! {
            _ = sigterm.recv() => libc::SIGTERM,
            _ = sigint.recv() => libc::SIGINT,
        };
        tracing::info!(signal = signal_name(first), "Shutdown signal received");

        tokio::spawn(async move {
            let second = tokio::select! {
                _ = sigterm.recv() => libc::SIGTERM,
                _ = sigint.recv() => libc::SIGINT,
            };
            tracing::warn!(signal = signal_name(second), "Second signal received, exiting now");
            std::process::exit(128 + second);
        });
    })
}

#[cfg(unix)]
fn signal_name(signo: libc::c_int) -> &'static str {
    match signo {
        libc::SIGTERM => "SIGTERM",
        libc::SIGINT => "SIGINT",
        _ => "unknown",
    }
}

/// Register the Ctrl+C handler and return a future resolving when it fires.
#[cfg(not(unix))]
pub fn termination() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!(signal = "ctrl_c", "Shutdown signal received"),
            Err(err) => {
                tracing::error!(error = %err, "Ctrl+C handler failed; waiting forever");
                std::future::pending::<()>().await
            }
        }
    })
}
