//! Unix signal handling for component processes.
//!
//! - SIGTERM: graceful shutdown (drain)
//! - SIGINT: logged and ignored; only the orchestrator stops a component
//!
//! Installing the SIGINT listener replaces the default disposition, so a
//! Ctrl+C on the terminal group does not kill the process.

use std::future::Future;

use tracing::{debug, info, warn};

/// A future resolving when a termination signal arrives.
///
/// The handlers are installed by this call, not on first poll, so signals
/// sent between the call and the first poll are already handled. Must be
/// called from within a tokio runtime. Never resolves when the handlers
/// cannot be registered.
#[cfg(unix)]
pub fn terminate_signal() -> impl Future<Output = ()> + Send {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            None
        }
    };

    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to register SIGINT handler: {}", e);
            None
        }
    };

    debug!("Signal handlers installed (SIGTERM, SIGINT)");

    async move {
        let Some(mut sigterm) = sigterm else {
            return std::future::pending().await;
        };
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    return;
                }
                Some(_) = recv_optional(&mut sigint) => {
                    info!("Received SIGINT, ignored");
                }
            }
        }
    }
}

#[cfg(unix)]
async fn recv_optional(signal: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}

/// Fallback for non-Unix systems: Ctrl+C is swallowed, nothing terminates.
#[cfg(not(unix))]
pub fn terminate_signal() -> impl Future<Output = ()> + Send {
    async {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, ignored"),
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    return std::future::pending().await;
                }
            }
        }
    }
}
