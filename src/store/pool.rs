//! Connection admission gate.
//!
//! # Responsibilities
//! - Cap simultaneously open SQLite connections via semaphore
//! - Open each connection on the blocking pool, bounded by a timeout
//! - Release the connection and its slot on every exit path
//!
//! # Design Decisions
//! - One short-lived connection per operation, nothing is cached
//! - The slot travels with the connection into the blocking closure, so a
//!   caller that times out or is cancelled never frees capacity early
//! - The gate limits file handles; SQLite still serializes writers itself

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;
use crate::store::error::{StoreError, StoreResult};

/// Counts physically open connections across the lifetime of a store.
#[derive(Debug, Default)]
pub struct ConnectionGauge {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl ConnectionGauge {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        metrics::record_open_connections(now);
    }

    fn closed(&self) {
        let now = self.open.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::record_open_connections(now);
    }

    /// Connections open right now.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of connections ever open at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Semaphore-gated factory of short-lived connections.
pub(crate) struct ConnectionPool {
    path: PathBuf,
    timeout: Duration,
    capacity: usize,
    gate: Arc<Semaphore>,
    gauge: Arc<ConnectionGauge>,
}

impl ConnectionPool {
    pub(crate) fn new(path: PathBuf, capacity: usize, timeout: Duration, gauge: Arc<ConnectionGauge>) -> Self {
        Self {
            path,
            timeout,
            capacity,
            gate: Arc::new(Semaphore::new(capacity)),
            gauge,
        }
    }

    /// Wait for a slot, then open a connection within the timeout.
    ///
    /// Waiting for the slot is unbounded; only the open itself is timed.
    pub(crate) async fn acquire(&self, op: &'static str) -> StoreResult<PooledConnection> {
        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::NotInitialized)?;

        let path = self.path.clone();
        let timeout = self.timeout;
        let gauge = Arc::clone(&self.gauge);
        let open = tokio::task::spawn_blocking(move || PooledConnection::open(path, timeout, permit, gauge));

        // On timeout the handle is dropped; the worker still finishes and the
        // returned connection is closed with its slot when it goes out of scope.
        match tokio::time::timeout(self.timeout, open).await {
            Ok(Ok(Ok(conn))) => Ok(conn),
            Ok(Ok(Err(e))) => Err(StoreError::from_sqlite(op, self.timeout, e)),
            Ok(Err(e)) => Err(StoreError::Worker { op, source: e }),
            Err(_) => Err(StoreError::Timeout { op, timeout: self.timeout }),
        }
    }

    /// Run `f` against a fresh connection on the blocking pool.
    pub(crate) async fn run<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.acquire(op).await?;
        let worker = tokio::task::spawn_blocking(move || {
            let out = f(&mut *conn);
            drop(conn);
            out
        });

        match worker.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::from_sqlite(op, self.timeout, e)),
            Err(e) => Err(StoreError::Worker { op, source: e }),
        }
    }

    /// Wait for in-flight operations to give their slots back, then refuse
    /// any further acquisitions. Returns false if the timeout hit first.
    pub(crate) async fn shutdown(&self) -> bool {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        let drained = match tokio::time::timeout(self.timeout, self.gate.acquire_many(all)).await {
            Ok(Ok(permits)) => {
                drop(permits);
                true
            }
            Ok(Err(_)) => true,
            Err(_) => false,
        };
        self.gate.close();
        drained
    }

    /// Free slots at this instant.
    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.gate.available_permits()
    }
}

/// An open connection holding one gate slot.
///
/// Field order matters: the connection is dropped (closed) before the slot,
/// so the gauge and the semaphore never under-count open handles.
#[derive(Debug)]
pub(crate) struct PooledConnection {
    conn: Connection,
    _slot: Slot,
}

impl PooledConnection {
    fn open(
        path: PathBuf,
        timeout: Duration,
        permit: OwnedSemaphorePermit,
        gauge: Arc<ConnectionGauge>,
    ) -> rusqlite::Result<Self> {
        let conn = Connection::open(&path)?;
        let pooled = Self {
            conn,
            _slot: Slot::new(gauge, permit),
        };
        pooled.conn.busy_timeout(timeout)?;
        Ok(pooled)
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Gate slot plus gauge bookkeeping, released on drop.
#[derive(Debug)]
struct Slot {
    gauge: Arc<ConnectionGauge>,
    _permit: OwnedSemaphorePermit,
}

impl Slot {
    fn new(gauge: Arc<ConnectionGauge>, permit: OwnedSemaphorePermit) -> Self {
        gauge.opened();
        Self { gauge, _permit: permit }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.gauge.closed();
        tracing::trace!(open = self.gauge.open(), "Database connection closed");
    }
}
