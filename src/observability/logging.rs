//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Write to stdout and to a log file under the data directory
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - File output goes through a non-blocking writer; the returned guard must
//!   live until the process exits or buffered lines are lost
//! - Log level configurable via `RUST_LOG`

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RelayConfig;

const DEFAULT_FILTER: &str = "support_relay=info,warn";

/// Initialize the global subscriber.
pub fn init_logging(config: &RelayConfig) -> std::io::Result<WorkerGuard> {
    let data_dir = &config.storage.data_dir;
    std::fs::create_dir_all(data_dir)?;

    let file_appender =
        tracing_appender::rolling::never(data_dir, config.observability.log_file_name());
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
