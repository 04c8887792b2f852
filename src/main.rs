//! Support relay (v1)
//!
//! Bridges private bot conversations into forum topics of a support group.
//!
//! # Architecture Overview
//!
//! ```text
//!     User (private chat)                                  Support group (forum)
//!            │                                                      ▲
//!            ▼                                                      │
//!     ┌─────────────┐    ┌──────────────┐    ┌─────────────┐        │
//!     │  transport  │───▶│    relay     │───▶│   BotApi    │────────┘
//!     │ (long poll) │    │   router     │    │  copy/send  │
//!     └──────┬──────┘    └──────┬───────┘    └─────────────┘
//!            │                  │
//!            │                  ▼
//!            │           ┌──────────────┐
//!            │           │    store     │  user_id ↔ topic_id (SQLite)
//!            │           │ gated access │
//!            │           └──────────────┘
//!            ▼
//!     ┌─────────────────────────────────────────────┐
//!     │ lifecycle: signals → shutdown → coordinator  │
//!     └─────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use support_relay::config::load_config;
use support_relay::lifecycle::startup;
use support_relay::observability::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Err(e.into());
        }
    };

    // Dropping the guard flushes the log file.
    let _log_guard = init_logging(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        support_group_id = config.support_group_id,
        database = %config.storage.db_path().display(),
        max_connections = config.storage.max_connections,
        "support-relay starting"
    );

    if let Err(e) = startup::start(config).await {
        tracing::error!(error = %e, "Relay stopped with an error");
        return Err(e.into());
    }

    Ok(())
}
