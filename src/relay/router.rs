//! Inbound update routing.
//!
//! # Responsibilities
//! - Classify each message (private start, private message, topic reply,
//!   topic close)
//! - Resolve direction through the mapping store
//! - Turn failures into an error text for the sender; never stop polling
//!
//! A topic whose mapping cannot be stored is not deleted. It is logged with
//! its id and stays orphaned in the support group.

use std::sync::Arc;

use thiserror::Error;

use crate::observability::metrics;
use crate::relay::{templates, LinkButton, SupportChannel};
use crate::store::{MappingStore, StoreError};
use crate::transport::telegram::types::{ChatKind, Message, Update, User};
use crate::transport::TransportError;

/// What the router did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ignored,
    Start,
    UserToTopic,
    TopicToUser,
    CloseTopic,
}

impl Route {
    fn label(self) -> &'static str {
        match self {
            Route::Ignored => "ignored",
            Route::Start => "start",
            Route::UserToTopic => "user_to_topic",
            Route::TopicToUser => "topic_to_user",
            Route::CloseTopic => "close_topic",
        }
    }
}

#[derive(Debug, Error)]
enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Routes messages between private chats and the support group.
pub struct RelayRouter<C> {
    channel: C,
    store: Arc<MappingStore>,
    support_group_id: i64,
}

impl<C: SupportChannel> RelayRouter<C> {
    pub fn new(channel: C, store: Arc<MappingStore>, support_group_id: i64) -> Self {
        Self {
            channel,
            store,
            support_group_id,
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Route {
        match &update.message {
            Some(message) => self.handle_message(message).await,
            None => Route::Ignored,
        }
    }

    pub async fn handle_message(&self, message: &Message) -> Route {
        let route = self.classify(message);
        metrics::record_update(route.label());

        match route {
            Route::Ignored => {}
            Route::Start => self.on_start(message).await,
            Route::UserToTopic => self.on_user_message(message).await,
            Route::TopicToUser => self.on_support_reply(message).await,
            Route::CloseTopic => self.on_close(message).await,
        }
        route
    }

    fn classify(&self, message: &Message) -> Route {
        let Some(sender) = &message.from else {
            return Route::Ignored;
        };
        if sender.is_bot {
            return Route::Ignored;
        }

        if message.chat.kind == ChatKind::Private {
            return match message.command() {
                Some("start") => Route::Start,
                _ => Route::UserToTopic,
            };
        }

        if message.chat.id == self.support_group_id && message.message_thread_id.is_some() {
            return match message.command() {
                Some("close") => Route::CloseTopic,
                _ => Route::TopicToUser,
            };
        }

        Route::Ignored
    }

    async fn on_start(&self, message: &Message) {
        let Some(user) = &message.from else { return };

        if let Err(e) = self.open_conversation(message, user).await {
            tracing::error!(user_id = user.id, error = %e, "Failed to open support topic");
            self.answer(message, templates::ERROR_CREATION).await;
        }
    }

    async fn open_conversation(&self, message: &Message, user: &User) -> Result<(), RelayError> {
        if self.store.get_user_topic(user.id).await?.is_some() {
            self.channel.send_text(message.chat.id, None, templates::USER_START, None).await?;
            return Ok(());
        }

        let name = templates::topic_name(&user.full_name(), user.id);
        let topic_id = self.channel.create_topic(self.support_group_id, &name).await?;
        if let Err(e) = self.store.create_user_topic(user.id, topic_id).await {
            // The forum topic stays in the group; the next /start opens another.
            tracing::warn!(user_id = user.id, topic_id, "Forum topic created but left without a mapping");
            return Err(e.into());
        }

        self.channel.send_text(message.chat.id, None, templates::USER_START, None).await?;
        self.channel
            .send_text(
                self.support_group_id,
                Some(topic_id),
                &templates::support_user_info(&name, user.id),
                Some(LinkButton::user_profile(user.id)),
            )
            .await?;

        tracing::info!(user_id = user.id, topic_id, "Support topic opened");
        Ok(())
    }

    async fn on_user_message(&self, message: &Message) {
        let Some(user) = &message.from else { return };

        if let Err(e) = self.relay_to_topic(message, user).await {
            tracing::error!(user_id = user.id, error = %e, "Failed to relay message to support");
            self.answer(message, templates::ERROR_SEND_MESSAGE).await;
        }
    }

    async fn relay_to_topic(&self, message: &Message, user: &User) -> Result<(), RelayError> {
        match self.store.get_user_topic(user.id).await? {
            Some(topic_id) => {
                self.channel
                    .copy(self.support_group_id, Some(topic_id), message.chat.id, message.message_id)
                    .await?;
            }
            None => {
                self.channel
                    .send_text(message.chat.id, None, templates::ERROR_NOT_STARTED, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_support_reply(&self, message: &Message) {
        let Some(topic_id) = message.message_thread_id else { return };

        if let Err(e) = self.relay_to_user(message, topic_id).await {
            tracing::error!(topic_id, error = %e, "Failed to relay reply to user");
            self.reply(message, templates::ERROR_SEND_TO_USER).await;
        }
    }

    async fn relay_to_user(&self, message: &Message, topic_id: i64) -> Result<(), RelayError> {
        match self.store.get_user_by_topic(topic_id).await? {
            Some(user_id) => {
                self.channel.copy(user_id, None, message.chat.id, message.message_id).await?;
            }
            None => self.channel.reply(message, templates::ERROR_USER_NOT_FOUND).await?,
        }
        Ok(())
    }

    async fn on_close(&self, message: &Message) {
        let Some(topic_id) = message.message_thread_id else { return };

        if let Err(e) = self.close_conversation(message, topic_id).await {
            tracing::error!(topic_id, error = %e, "Failed to close support topic");
            self.reply(message, templates::ERROR_SEND_TO_USER).await;
        }
    }

    async fn close_conversation(&self, message: &Message, topic_id: i64) -> Result<(), RelayError> {
        let Some(user_id) = self.store.get_user_by_topic(topic_id).await? else {
            self.channel.reply(message, templates::ERROR_USER_NOT_FOUND).await?;
            return Ok(());
        };

        self.store.delete_user_topic(user_id).await?;
        self.channel.reply(message, templates::TOPIC_CLOSED).await?;

        // The mapping is already gone; a blocked user must not fail the close.
        if let Err(e) = self.channel.send_text(user_id, None, templates::USER_CLOSED, None).await {
            tracing::warn!(user_id, error = %e, "Could not notify user about closed request");
        }
        tracing::info!(user_id, topic_id, "Support topic closed");
        Ok(())
    }

    /// Best-effort error text back into a private chat.
    async fn answer(&self, message: &Message, text: &str) {
        if let Err(e) = self.channel.send_text(message.chat.id, None, text, None).await {
            tracing::warn!(chat_id = message.chat.id, error = %e, "Could not deliver error notice");
        }
    }

    /// Best-effort error reply inside a topic.
    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self.channel.reply(message, text).await {
            tracing::warn!(chat_id = message.chat.id, error = %e, "Could not deliver error reply");
        }
    }
}
