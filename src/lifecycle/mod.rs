//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config loaded → Store initialized → Transport created → Coordinator runs
//!
//! Coordinator (coordinator.rs):
//!     Poll loop task ⟷ Shutdown::wait → Cancel loser → Close transport session
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second signal  → Forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: store first, then transport, then the loop
//! - Ordered shutdown: cancel loop, close session, close store
//! - Each teardown step runs exactly once

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::{LifecycleError, RunOutcome};
pub use shutdown::Shutdown;
