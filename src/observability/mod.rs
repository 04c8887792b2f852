//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stdout + data_dir/logs.log)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log file / container stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
