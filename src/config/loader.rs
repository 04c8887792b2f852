//! Configuration loading from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::schema::{RelayConfig, StorageConfig};
use crate::config::validation::{validate_config, validate_storage, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable could not be parsed into the expected type.
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} is not set in the environment", key),
            ConfigError::Invalid { key, value, expected } => {
                write!(f, "{} must be {}, got '{}'", key, expected, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from the process environment.
///
/// A `.env` file in the working directory is read first when present;
/// variables already set in the environment win.
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_dotenv();
    load_from(|key| std::env::var(key).ok())
}

/// Read `.env` into the process environment if present. An unreadable file
/// is logged and skipped.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }
}

/// Load and validate only the storage settings (`DATA_DIR`, `DB_NAME`,
/// `MAX_DB_CONNECTIONS`, `DB_TIMEOUT`).
pub fn load_storage_from<F>(lookup: F) -> Result<StorageConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    let mut storage = StorageConfig::default();
    apply_storage(&env, &mut storage)?;
    validate_storage(&storage).map_err(ConfigError::Validation)?;
    Ok(storage)
}

/// Load and validate configuration from an arbitrary variable source.
pub fn load_from<F>(lookup: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let bot_token = env.required("BOT_TOKEN")?;
    let support_group_id: i64 = env.parse_required("SUPPORT_GROUP_ID", "an integer")?;

    let mut config = RelayConfig::new(bot_token, support_group_id);

    apply_storage(&env, &mut config.storage)?;

    if let Some(url) = env.optional("TELEGRAM_API_URL") {
        config.telegram.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(secs) = env.parse_optional("POLL_TIMEOUT_SECS", "a non-negative integer")? {
        config.telegram.poll_timeout_secs = secs;
    }

    config.observability.metrics_address =
        env.parse_optional::<SocketAddr>("METRICS_ADDRESS", "a socket address")?;
    config.observability.log_file = env.optional("LOG_FILE");

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_storage<F>(env: &Env<F>, storage: &mut StorageConfig) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env.optional("DATA_DIR") {
        storage.data_dir = PathBuf::from(dir);
    }
    if let Some(name) = env.optional("DB_NAME") {
        storage.db_name = name;
    }
    if let Some(max) = env.parse_optional("MAX_DB_CONNECTIONS", "a non-negative integer")? {
        storage.max_connections = max;
    }
    if let Some(timeout) = env.parse_optional("DB_TIMEOUT", "a number")? {
        storage.timeout_secs = timeout;
    }
    Ok(())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_required<T: FromStr>(&self, key: &'static str, expected: &'static str) -> Result<T, ConfigError> {
        let raw = self.required(key)?;
        parse(key, raw, expected)
    }

    fn parse_optional<T: FromStr>(&self, key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError> {
        self.optional(key).map(|raw| parse(key, raw, expected)).transpose()
    }
}

fn parse<T: FromStr>(key: &'static str, raw: String, expected: &'static str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw, expected })
}
