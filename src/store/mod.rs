//! Persistent user ↔ topic mapping.
//!
//! # Data Flow
//! ```text
//! relay handler / relay-cli
//!     → mapping.rs (validate ids, check Ready, log + metrics)
//!     → pool.rs (semaphore slot → open connection on blocking pool)
//!     → SQLite file (single statement, auto-commit)
//!     → connection closed, slot released
//! ```
//!
//! # Design Decisions
//! - The semaphore caps open file handles; it is not a transaction lock
//! - No connection outlives a single operation
//! - "No mapping" is `None`, never an error
//! - Schema setup runs once under an async mutex

pub mod error;
pub mod mapping;
mod pool;
mod schema;

pub use error::{StoreError, StoreResult};
pub use mapping::{MappingRecord, MappingStore, StoreState, StoreStats};
