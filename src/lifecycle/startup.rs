//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Wire OS signals to the shutdown flag
//! - Run the message loop until it ends or shutdown is requested
//! - Close the mapping store on every exit path
//!
//! # Design Decisions
//! - Fail fast: a store or transport setup error is fatal
//! - Store first, transport second, message loop last
//! - Teardown runs in reverse: loop, session, store

use std::sync::Arc;

use thiserror::Error;

use crate::config::RelayConfig;
use crate::lifecycle::coordinator::{run_until_shutdown, LifecycleError, RunOutcome};
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::store::{MappingStore, StoreError};
use crate::transport::{TelegramTransport, Transport, TransportError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize mapping store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to create transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Bring the relay up from a loaded config and run it to completion.
pub async fn start(config: Arc<RelayConfig>) -> Result<RunOutcome, StartupError> {
    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr);
    }

    let store = Arc::new(MappingStore::new(&config.storage));
    store.initialize().await?;
    tracing::info!(path = %store.path().display(), "Mapping store ready");

    let transport = match TelegramTransport::new(&config, Arc::clone(&store)) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            store.close().await;
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    Ok(run(store, transport, shutdown).await?)
}

/// Run the message loop, then close the store regardless of how it ended.
pub async fn run<T>(store: Arc<MappingStore>, transport: Arc<T>, shutdown: Shutdown) -> Result<RunOutcome, LifecycleError>
where
    T: Transport + ?Sized,
{
    tracing::info!("Relay started");

    let outcome = run_until_shutdown(transport, &shutdown).await;
    match &outcome {
        Ok(RunOutcome::ShutdownRequested) => tracing::info!("Shutdown requested"),
        Ok(RunOutcome::LoopFinished) => tracing::info!("Message loop finished"),
        Err(e) => tracing::error!(error = %e, error_debug = ?e, "Message loop failed"),
    }

    store.close().await;
    tracing::info!("Shutdown complete");

    outcome
}
