//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (+ optional .env file)
//!     → loader.rs (read & parse)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; there is no reload
//! - Only the bot token and support group are required
//! - Validation separates syntactic (parsing) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_dotenv, load_storage_from, ConfigError};
pub use schema::RelayConfig;
pub use schema::StorageConfig;
pub use schema::TelegramConfig;
pub use schema::ObservabilityConfig;
