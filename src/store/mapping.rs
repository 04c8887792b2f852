//! User ↔ topic mapping store.
//!
//! # Responsibilities
//! - One-time, lock-guarded schema initialization
//! - CRUD over the `users` table through the connection gate
//! - Argument validation before any I/O
//! - Logging and metrics for failed operations
//!
//! # State Machine
//! ```text
//! Uninitialized → Initializing → Ready → Closed
//!                      ↑                    │
//!                      └────────────────────┘  (initialize again)
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::config::StorageConfig;
use crate::observability::metrics;
use crate::store::error::{StoreError, StoreResult};
use crate::store::pool::{ConnectionGauge, ConnectionPool};
use crate::store::schema;

/// Lifecycle state of a [`MappingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// A persisted user → topic association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRecord {
    pub user_id: i64,
    pub topic_id: i64,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub created_at: String,
    pub updated_at: String,
}

/// Point-in-time view of store internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub state: StoreState,
    pub open_connections: usize,
    pub peak_connections: usize,
    /// Completed schema initializations since construction.
    pub initializations: u64,
}

struct Inner {
    state: StoreState,
    pool: Option<Arc<ConnectionPool>>,
}

/// Bounded-concurrency access to the mapping table.
///
/// Every call opens its own connection through a semaphore-gated pool and
/// closes it before returning. The database file is the only source of truth.
pub struct MappingStore {
    path: PathBuf,
    max_connections: usize,
    timeout: Duration,
    init_lock: tokio::sync::Mutex<()>,
    inner: Mutex<Inner>,
    gauge: Arc<ConnectionGauge>,
    initializations: AtomicU64,
}

impl MappingStore {
    /// Create an uninitialized store. No file is touched until
    /// [`initialize`](Self::initialize).
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            path: config.db_path(),
            max_connections: config.max_connections.min(StorageConfig::MAX_CONNECTIONS),
            timeout: config.timeout(),
            init_lock: tokio::sync::Mutex::new(()),
            inner: Mutex::new(Inner {
                state: StoreState::Uninitialized,
                pool: None,
            }),
            gauge: Arc::new(ConnectionGauge::default()),
            initializations: AtomicU64::new(0),
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == StoreState::Ready
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            state: self.state(),
            open_connections: self.gauge.open(),
            peak_connections: self.gauge.peak(),
            initializations: self.initializations.load(Ordering::SeqCst),
        }
    }

    /// Create the gate and the schema. Concurrent callers collapse into one
    /// initialization; calling again while ready is a no-op.
    pub async fn initialize(&self) -> StoreResult<()> {
        let _guard = self.init_lock.lock().await;

        let previous = self.state();
        if previous == StoreState::Ready {
            return Ok(());
        }

        let mut rollback = Rollback { store: self, previous, armed: true };
        self.set_state(StoreState::Initializing, None);

        match self.bootstrap().await {
            Ok(pool) => {
                rollback.armed = false;
                self.set_state(StoreState::Ready, Some(pool));
                self.initializations.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    path = %self.path.display(),
                    max_connections = self.max_connections,
                    "Mapping store initialized"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Mapping store initialization failed");
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> StoreResult<Arc<ConnectionPool>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = Arc::new(ConnectionPool::new(
            self.path.clone(),
            self.max_connections,
            self.timeout,
            Arc::clone(&self.gauge),
        ));
        pool.run("initialize", schema::apply).await?;
        Ok(pool)
    }

    /// Topic assigned to `user_id`, if any.
    pub async fn get_user_topic(&self, user_id: i64) -> StoreResult<Option<i64>> {
        let user_id = validate_id("user_id", user_id)?;
        self.execute("get_user_topic", Some(("user_id", user_id)), move |conn| {
            conn.query_row(
                "SELECT topic_id FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Assign `topic_id` to `user_id`, replacing any previous topic of that
    /// user. A topic already owned by another user is rejected by the
    /// UNIQUE constraint.
    pub async fn create_user_topic(&self, user_id: i64, topic_id: i64) -> StoreResult<()> {
        let user_id = validate_id("user_id", user_id)?;
        let topic_id = validate_id("topic_id", topic_id)?;

        self.execute("create_user_topic", Some(("user_id", user_id)), move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, topic_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET topic_id = excluded.topic_id",
                params![user_id, topic_id],
            )
        })
        .await?;

        tracing::info!(user_id, topic_id, "Topic mapping stored");
        Ok(())
    }

    /// User owning `topic_id`, if any.
    pub async fn get_user_by_topic(&self, topic_id: i64) -> StoreResult<Option<i64>> {
        let topic_id = validate_id("topic_id", topic_id)?;
        self.execute("get_user_by_topic", Some(("topic_id", topic_id)), move |conn| {
            conn.query_row(
                "SELECT user_id FROM users WHERE topic_id = ?1",
                params![topic_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Remove the mapping of `user_id`. Returns false when there was none.
    pub async fn delete_user_topic(&self, user_id: i64) -> StoreResult<bool> {
        let user_id = validate_id("user_id", user_id)?;
        let deleted = self
            .execute("delete_user_topic", Some(("user_id", user_id)), move |conn| {
                conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])
            })
            .await?
            > 0;

        if deleted {
            tracing::info!(user_id, "Topic mapping deleted");
        }
        Ok(deleted)
    }

    /// Full row for `user_id`, timestamps included.
    pub async fn get_mapping(&self, user_id: i64) -> StoreResult<Option<MappingRecord>> {
        let user_id = validate_id("user_id", user_id)?;
        self.execute("get_mapping", Some(("user_id", user_id)), move |conn| {
            conn.query_row(
                "SELECT user_id, topic_id, created_at, updated_at FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(MappingRecord {
                        user_id: row.get(0)?,
                        topic_id: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Number of open conversations.
    pub async fn count_mappings(&self) -> StoreResult<u64> {
        let count: i64 = self
            .execute("count_mappings", None, |conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Stop admitting operations, let in-flight ones finish (bounded by the
    /// configured timeout) and mark the store closed. Safe to call repeatedly.
    pub async fn close(&self) {
        let _guard = self.init_lock.lock().await;

        let pool = {
            let mut inner = self.lock();
            inner.state = StoreState::Closed;
            inner.pool.take()
        };

        let Some(pool) = pool else {
            return;
        };

        if !pool.shutdown().await {
            tracing::warn!(
                timeout = ?self.timeout,
                open_connections = self.gauge.open(),
                "Closed mapping store with operations still in flight"
            );
        }
        tracing::info!(path = %self.path.display(), "Mapping store closed");
    }

    /// Run one statement through the gate. `key` names the row the operation
    /// targets, if any, for the error log.
    async fn execute<T, F>(&self, op: &'static str, key: Option<(&'static str, i64)>, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.ready_pool()?;
        let start = Instant::now();
        let result = pool.run(op, f).await;

        match &result {
            Ok(_) => metrics::record_store_op(op, "ok", start),
            Err(e) => {
                metrics::record_store_op(op, e.outcome(), start);
                if e.is_reportable() {
                    match key {
                        Some((name, id)) => {
                            tracing::error!(op, key = name, id, error = %e, "Store operation failed")
                        }
                        None => tracing::error!(op, error = %e, "Store operation failed"),
                    }
                }
            }
        }
        result
    }

    fn ready_pool(&self) -> StoreResult<Arc<ConnectionPool>> {
        let inner = self.lock();
        match (&inner.state, &inner.pool) {
            (StoreState::Ready, Some(pool)) => Ok(Arc::clone(pool)),
            _ => Err(StoreError::NotInitialized),
        }
    }

    fn set_state(&self, state: StoreState, pool: Option<Arc<ConnectionPool>>) {
        let mut inner = self.lock();
        inner.state = state;
        inner.pool = pool;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Restores the pre-initialization state if `initialize` fails or its
/// future is dropped mid-way.
struct Rollback<'a> {
    store: &'a MappingStore,
    previous: StoreState,
    armed: bool,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.set_state(self.previous, None);
        }
    }
}

fn validate_id(name: &'static str, value: i64) -> StoreResult<i64> {
    if value > 0 {
        Ok(value)
    } else {
        Err(StoreError::InvalidArgument { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            data_dir: dir.path().join("data"),
            db_name: "mapping.db".into(),
            max_connections: 3,
            timeout_secs: 5.0,
        }
    }

    async fn ready_store(dir: &tempfile::TempDir) -> MappingStore {
        let store = MappingStore::new(&config(dir));
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn open_lookup_close_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;

        store.create_user_topic(42, 1001).await.unwrap();
        assert_eq!(store.get_user_topic(42).await.unwrap(), Some(1001));
        assert_eq!(store.get_user_by_topic(1001).await.unwrap(), Some(42));

        assert!(store.delete_user_topic(42).await.unwrap());
        assert_eq!(store.get_user_topic(42).await.unwrap(), None);
        assert_eq!(store.get_user_by_topic(1001).await.unwrap(), None);
        assert!(!store.delete_user_topic(42).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;

        assert_eq!(store.get_user_topic(7).await.unwrap(), None);
        assert_eq!(store.get_mapping(7).await.unwrap(), None);
        assert!(!store.delete_user_topic(7).await.unwrap());
    }

    #[tokio::test]
    async fn recreate_replaces_topic() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;

        store.create_user_topic(5, 100).await.unwrap();
        let first = store.get_mapping(5).await.unwrap().unwrap();

        store.create_user_topic(5, 200).await.unwrap();
        assert_eq!(store.get_user_topic(5).await.unwrap(), Some(200));
        assert_eq!(store.get_user_by_topic(100).await.unwrap(), None);
        assert_eq!(store.get_user_by_topic(200).await.unwrap(), Some(5));
        assert_eq!(store.count_mappings().await.unwrap(), 1);

        let second = store.get_mapping(5).await.unwrap().unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn topic_cannot_be_shared() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;

        store.create_user_topic(1, 500).await.unwrap();
        let err = store.create_user_topic(2, 500).await.unwrap_err();

        assert!(err.is_constraint_violation());
        assert_eq!(store.get_user_by_topic(500).await.unwrap(), Some(1));
        assert_eq!(store.get_user_topic(2).await.unwrap(), None);
        assert_eq!(store.count_mappings().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_ids_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        // Never initialized: any I/O attempt would report NotInitialized.
        let store = MappingStore::new(&config(&dir));

        assert!(matches!(
            store.get_user_topic(0).await,
            Err(StoreError::InvalidArgument { name: "user_id", value: 0 })
        ));
        assert!(matches!(
            store.create_user_topic(1, -9).await,
            Err(StoreError::InvalidArgument { name: "topic_id", value: -9 })
        ));
        assert!(matches!(
            store.get_user_by_topic(-1).await,
            Err(StoreError::InvalidArgument { name: "topic_id", .. })
        ));
        assert!(matches!(
            store.delete_user_topic(i64::MIN).await,
            Err(StoreError::InvalidArgument { name: "user_id", .. })
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn operations_require_ready_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::new(&config(&dir));
        assert_eq!(store.state(), StoreState::Uninitialized);
        assert!(matches!(store.get_user_topic(1).await, Err(StoreError::NotInitialized)));

        store.initialize().await.unwrap();
        store.close().await;
        assert_eq!(store.state(), StoreState::Closed);
        assert!(matches!(store.create_user_topic(1, 2).await, Err(StoreError::NotInitialized)));

        // Idempotent.
        store.close().await;
        assert_eq!(store.state(), StoreState::Closed);
    }

    #[tokio::test]
    async fn reinitialize_after_close_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;
        store.create_user_topic(9, 90).await.unwrap();
        store.close().await;

        store.initialize().await.unwrap();
        assert_eq!(store.get_user_topic(9).await.unwrap(), Some(90));
        assert_eq!(store.stats().initializations, 2);
    }

    #[tokio::test]
    async fn initialize_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;
        store.initialize().await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.state, StoreState::Ready);
        assert_eq!(stats.initializations, 1);
        assert_eq!(stats.open_connections, 0);
    }

    #[tokio::test]
    async fn failed_initialize_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the database file should be makes open fail.
        let mut cfg = config(&dir);
        std::fs::create_dir_all(cfg.db_path()).unwrap();
        cfg.timeout_secs = 1.0;

        let store = MappingStore::new(&cfg);
        assert!(store.initialize().await.is_err());
        assert_eq!(store.state(), StoreState::Uninitialized);
        assert_eq!(store.stats().open_connections, 0);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn whole_table_failure_logs_no_row_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ready_store(&dir).await;
        rusqlite::Connection::open(store.path())
            .unwrap()
            .execute_batch("DROP TABLE users")
            .unwrap();

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let err = store.count_mappings().await.unwrap_err();
        assert!(matches!(err, StoreError::Database { op: "count_mappings", .. }));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("count_mappings"), "{output}");
        assert!(!output.contains("key="), "{output}");
        assert!(!output.contains("id=0"), "{output}");
    }
}
