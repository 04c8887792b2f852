//! Bot API HTTP client.
//!
//! # Responsibilities
//! - POST JSON bodies to `{api_url}/bot{token}/{method}`
//! - Unwrap the `{ok, result}` envelope into typed results
//! - Keep the token out of error messages

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RelayConfig;
use crate::relay::{LinkButton, SupportChannel};
use crate::transport::telegram::types::{
    ApiResponse, CopyMessage, CreateForumTopic, ForumTopic, GetUpdates, InlineKeyboardButton,
    InlineKeyboardMarkup, Message, MessageId, ReplyParameters, SendMessage, Update,
};
use crate::transport::TransportError;

/// Extra time on top of the long-poll timeout before the HTTP request is
/// abandoned.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Thin typed wrapper over the Bot API.
#[derive(Clone)]
pub struct BotApi {
    http: reqwest::Client,
    base_url: String,
}

impl BotApi {
    pub fn new(config: &RelayConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.telegram.poll_timeout_secs) + REQUEST_GRACE)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", config.telegram.api_url, config.bot_token),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(params)
            .send()
            .await?;

        // Error statuses still carry the JSON envelope.
        let envelope: ApiResponse<R> = response.json().await?;
        envelope.into_result()
    }

    /// Long-poll for new message updates.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout_secs,
                allowed_updates: &["message"],
            },
        )
        .await
    }

    pub async fn create_forum_topic(&self, chat_id: i64, name: &str) -> Result<ForumTopic, TransportError> {
        self.call("createForumTopic", &CreateForumTopic { chat_id, name }).await
    }

    pub async fn send_message(&self, request: &SendMessage<'_>) -> Result<Message, TransportError> {
        self.call("sendMessage", request).await
    }

    pub async fn copy_message(&self, request: &CopyMessage) -> Result<MessageId, TransportError> {
        self.call("copyMessage", request).await
    }
}

#[async_trait]
impl SupportChannel for BotApi {
    async fn create_topic(&self, chat_id: i64, name: &str) -> Result<i64, TransportError> {
        let topic = self.create_forum_topic(chat_id, name).await?;
        tracing::debug!(chat_id, topic_id = topic.message_thread_id, name = %topic.name, "Forum topic created");
        Ok(topic.message_thread_id)
    }

    async fn send_text(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
        button: Option<LinkButton>,
    ) -> Result<(), TransportError> {
        let reply_markup = button.map(|b| InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton { text: b.text, url: b.url }]],
        });
        self.send_message(&SendMessage {
            chat_id,
            text,
            message_thread_id: thread_id,
            reply_markup,
            reply_parameters: None,
        })
        .await?;
        Ok(())
    }

    async fn copy(
        &self,
        to_chat: i64,
        thread_id: Option<i64>,
        from_chat: i64,
        message_id: i64,
    ) -> Result<(), TransportError> {
        self.copy_message(&CopyMessage {
            chat_id: to_chat,
            from_chat_id: from_chat,
            message_id,
            message_thread_id: thread_id,
        })
        .await?;
        Ok(())
    }

    async fn reply(&self, message: &Message, text: &str) -> Result<(), TransportError> {
        self.send_message(&SendMessage {
            chat_id: message.chat.id,
            text,
            message_thread_id: message.message_thread_id,
            reply_markup: None,
            reply_parameters: Some(ReplyParameters {
                message_id: message.message_id,
                allow_sending_without_reply: true,
            }),
        })
        .await?;
        Ok(())
    }
}
