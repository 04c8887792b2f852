//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (store operations, connections, relayed updates)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `relay_store_operations_total` (counter): store calls by op, outcome
//! - `relay_store_operation_duration_seconds` (histogram): store call latency
//! - `relay_store_open_connections` (gauge): currently open SQLite connections
//! - `relay_updates_total` (counter): inbound updates by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are static strings only

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished store operation.
pub fn record_store_op(op: &'static str, outcome: &'static str, start: Instant) {
    counter!("relay_store_operations_total", "op" => op, "outcome" => outcome).increment(1);
    histogram!("relay_store_operation_duration_seconds", "op" => op)
        .record(start.elapsed().as_secs_f64());
}

/// Record the current number of open database connections.
pub fn record_open_connections(count: usize) {
    gauge!("relay_store_open_connections").set(count as f64);
}

/// Record an inbound update and the route it took.
pub fn record_update(route: &'static str) {
    counter!("relay_updates_total", "route" => route).increment(1);
}

/// Record a failed long poll.
pub fn record_poll_error() {
    counter!("relay_poll_errors_total").increment(1);
}
