//! Store error definitions.

use std::time::Duration;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during mapping store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Identifier was zero or negative. Raised before any I/O.
    #[error("invalid {name}: {value} (must be a positive integer)")]
    InvalidArgument { name: &'static str, value: i64 },

    /// Store is not in the `Ready` state.
    #[error("mapping store is not initialized")]
    NotInitialized,

    /// Connection open or a locked database exceeded the configured timeout.
    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    /// Any other SQLite failure.
    #[error("{op} failed: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The blocking worker running the query panicked or was cancelled.
    #[error("{op} worker failed: {source}")]
    Worker {
        op: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    /// Data directory could not be created.
    #[error("cannot prepare data directory: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify a driver error; lock contention counts as a timeout.
    pub(crate) fn from_sqlite(op: &'static str, timeout: Duration, source: rusqlite::Error) -> Self {
        match source.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Timeout { op, timeout }
            }
            _ => StoreError::Database { op, source },
        }
    }

    /// True when a UNIQUE or other constraint rejected the write.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Database { source, .. } => {
                source.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
            }
            _ => false,
        }
    }

    /// True for the kinds the store logs itself. Argument and state errors
    /// are the caller's to report.
    pub(crate) fn is_reportable(&self) -> bool {
        !matches!(self, StoreError::InvalidArgument { .. } | StoreError::NotInitialized)
    }

    /// Short outcome label for metrics.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            StoreError::InvalidArgument { .. } => "invalid_argument",
            StoreError::NotInitialized => "not_initialized",
            StoreError::Timeout { .. } => "timeout",
            StoreError::Database { .. } | StoreError::Worker { .. } | StoreError::Io(_) => "error",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
