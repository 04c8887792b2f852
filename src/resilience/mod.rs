//! Resilience helpers.
//!
//! # Design Decisions
//! - Every external call has a deadline (store opens, Bot API requests)
//! - Failed polls back off exponentially with jitter so a flapping API is
//!   not hammered

pub mod backoff;
