//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (the loader handles syntax)
//! - Validate value ranges (timeouts and connection limit within bounds)
//! - Check the Bot API URL and database file name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{RelayConfig, StorageConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("BOT_TOKEN must not be blank")]
    EmptyToken,

    #[error("MAX_DB_CONNECTIONS must be greater than zero")]
    ZeroConnections,

    #[error("MAX_DB_CONNECTIONS must not exceed {max}, got {actual}")]
    TooManyConnections { actual: usize, max: usize },

    #[error("DB_TIMEOUT must be a positive number of seconds up to {max}, got {0}", max = StorageConfig::MAX_TIMEOUT_SECS)]
    InvalidTimeout(f64),

    #[error("DB_NAME must be a plain file name, got '{0}'")]
    InvalidDbName(String),

    #[error("TELEGRAM_API_URL is not a valid http(s) URL: {0}")]
    InvalidApiUrl(String),

    #[error("POLL_TIMEOUT_SECS must not exceed {max}, got {actual}")]
    PollTimeoutTooLong { actual: u64, max: u64 },
}

/// Longest long-poll the Bot API accepts.
const MAX_POLL_TIMEOUT_SECS: u64 = 50;

/// Validate a loaded configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot_token.trim().is_empty() {
        errors.push(ValidationError::EmptyToken);
    }

    storage_errors(&config.storage, &mut errors);

    match url::Url::parse(&config.telegram.api_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidApiUrl(config.telegram.api_url.clone())),
    }

    if config.telegram.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
        errors.push(ValidationError::PollTimeoutTooLong {
            actual: config.telegram.poll_timeout_secs,
            max: MAX_POLL_TIMEOUT_SECS,
        });
    }

    into_result(errors)
}

/// Validate only the storage section, for tools that never talk to the Bot API.
pub fn validate_storage(storage: &StorageConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    storage_errors(storage, &mut errors);
    into_result(errors)
}

fn storage_errors(storage: &StorageConfig, errors: &mut Vec<ValidationError>) {
    if storage.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }
    if storage.max_connections > StorageConfig::MAX_CONNECTIONS {
        errors.push(ValidationError::TooManyConnections {
            actual: storage.max_connections,
            max: StorageConfig::MAX_CONNECTIONS,
        });
    }
    // NaN fails both comparisons.
    if !(storage.timeout_secs > 0.0 && storage.timeout_secs <= StorageConfig::MAX_TIMEOUT_SECS) {
        errors.push(ValidationError::InvalidTimeout(storage.timeout_secs));
    }
    if storage.db_name.is_empty()
        || storage.db_name.contains('/')
        || storage.db_name.contains('\\')
        || storage.db_name == ".."
    {
        errors.push(ValidationError::InvalidDbName(storage.db_name.clone()));
    }
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
