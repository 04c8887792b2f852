//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Trigger graceful shutdown on the first signal
//! - Exit immediately on the second
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The listener is a detached task; it dies with the runtime

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Exit status used when a second signal forces the process down.
const FORCED_EXIT_CODE: i32 = 130;

/// Spawn a task that turns termination signals into `shutdown.trigger()`.
pub fn spawn_signal_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match next_signal().await {
            Ok(name) => {
                tracing::info!(signal = name, "Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        }

        if let Ok(name) = next_signal().await {
            tracing::warn!(signal = name, "Second signal received, forcing exit");
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}

#[cfg(unix)]
async fn next_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
