//! Relay between private chats and support-group topics.
//!
//! # Data Flow
//! ```text
//! private chat  ──/start──▶ create topic + mapping ──▶ info card in topic
//! private chat  ──message─▶ lookup topic ──▶ copy into topic
//! topic         ──message─▶ lookup user  ──▶ copy to private chat
//! topic         ──/close──▶ delete mapping ──▶ notify both sides
//! ```

pub mod router;
pub mod templates;

use async_trait::async_trait;

use crate::transport::telegram::types::Message;
use crate::transport::TransportError;

pub use router::{RelayRouter, Route};

/// An inline button opening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    /// Button opening the user's profile from inside the support group.
    pub fn user_profile(user_id: i64) -> Self {
        Self {
            text: templates::USER_BUTTON.to_string(),
            url: format!("tg://user?id={}", user_id),
        }
    }
}

/// Outbound calls the router needs from the chat platform.
#[async_trait]
pub trait SupportChannel: Send + Sync {
    /// Create a forum topic and return its thread id.
    async fn create_topic(&self, chat_id: i64, name: &str) -> Result<i64, TransportError>;

    async fn send_text(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
        button: Option<LinkButton>,
    ) -> Result<(), TransportError>;

    /// Copy a message without the "forwarded from" header.
    async fn copy(
        &self,
        to_chat: i64,
        thread_id: Option<i64>,
        from_chat: i64,
        message_id: i64,
    ) -> Result<(), TransportError>;

    /// Reply to `message` in its own chat and thread.
    async fn reply(&self, message: &Message, text: &str) -> Result<(), TransportError>;
}
