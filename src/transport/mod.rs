//! Message transport subsystem.
//!
//! # Data Flow
//! ```text
//! Bot API (long poll)
//!     → telegram/client.rs (HTTP + JSON envelope)
//!     → telegram/mod.rs (poll loop, offsets, retry with backoff)
//!     → relay router (per update)
//! ```
//!
//! # Design Decisions
//! - The lifecycle only sees the `Transport` trait: start polling, close
//! - Polling runs until cancelled, closed, or a fatal API error
//! - Transient HTTP failures are retried, never fatal

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::TelegramTransport;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network failure or undecodable response. The request URL is stripped
    /// because it carries the bot token.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The API answered with `ok: false`.
    #[error("API error{}: {description}", fmt_code(.code))]
    Api { code: Option<i64>, description: String },

    /// The token was rejected; polling cannot continue.
    #[error("bot token rejected by the API")]
    Unauthorized,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

fn fmt_code(code: &Option<i64>) -> String {
    code.map(|c| format!(" {c}")).unwrap_or_default()
}

/// Inbound/outbound message transport driven by the lifecycle coordinator.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Receive and dispatch messages until cancelled, closed, or a fatal
    /// error occurs.
    async fn start_polling(&self) -> Result<(), TransportError>;

    /// Release the session. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}
