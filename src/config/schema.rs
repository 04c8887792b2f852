//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! Values come from the environment (see `loader.rs`); everything except the
//! bot token and the support group has a default.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the support relay.
#[derive(Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Bot API token.
    pub bot_token: String,

    /// Chat id of the forum-enabled support group.
    pub support_group_id: i64,

    /// Storage settings.
    pub storage: StorageConfig,

    /// Telegram transport settings.
    pub telegram: TelegramConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Build a config with the given credentials and defaults everywhere else.
    pub fn new(bot_token: impl Into<String>, support_group_id: i64) -> Self {
        Self {
            bot_token: bot_token.into(),
            support_group_id,
            storage: StorageConfig::default(),
            telegram: TelegramConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bot_token", &"<redacted>")
            .field("support_group_id", &self.support_group_id)
            .field("storage", &self.storage)
            .field("telegram", &self.telegram)
            .field("observability", &self.observability)
            .finish()
    }
}

/// Mapping store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the database file and the log file.
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`.
    pub db_name: String,

    /// Maximum simultaneously open database connections.
    pub max_connections: usize,

    /// Connection open / busy timeout in seconds.
    pub timeout_secs: f64,
}

impl StorageConfig {
    /// Longest timeout SQLite's busy handler accepts (`i32` milliseconds).
    pub const MAX_TIMEOUT_SECS: f64 = i32::MAX as f64 / 1000.0;

    /// Upper bound on `max_connections`.
    pub const MAX_CONNECTIONS: usize = 1024;

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    /// Connection timeout, clamped into `0..=MAX_TIMEOUT_SECS`. NaN maps to zero.
    pub fn timeout(&self) -> Duration {
        let secs = self.timeout_secs.clamp(0.0, Self::MAX_TIMEOUT_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_name: "database.db".to_string(),
            max_connections: 5,
            timeout_secs: 10.0,
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Base URL of the Bot API server.
    pub api_url: String,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,

    /// Base delay for retrying failed polls.
    pub retry_base_delay_ms: u64,

    /// Maximum delay between poll retries.
    pub retry_max_delay_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus exporter address; the exporter is off when unset.
    pub metrics_address: Option<SocketAddr>,

    /// Log file name inside `data_dir`.
    pub log_file: Option<String>,
}

impl ObservabilityConfig {
    pub fn log_file_name(&self) -> &str {
        self.log_file.as_deref().unwrap_or("logs.log")
    }
}
