//! User-facing message texts.

pub const USER_START: &str = "👋 Hello!\n\
    How can we help? Describe your question and we will answer soon.\n\n\
    ℹ️ You can send photos, videos and documents.";

pub const USER_CLOSED: &str = "✅ Your request has been closed. Send /start to open a new one.";

pub const USER_BUTTON: &str = "👤 User";

pub const TOPIC_CLOSED: &str = "✅ Conversation closed. The user has to send /start to reopen it.";

pub const ERROR_CREATION: &str = "❌ Could not open a request. Please try again later.";
pub const ERROR_NOT_STARTED: &str = "⚠️ Please send /start first.";
pub const ERROR_SEND_MESSAGE: &str = "❌ Could not deliver your message. Please try again later.";
pub const ERROR_USER_NOT_FOUND: &str = "❌ No user is linked to this topic.";
pub const ERROR_SEND_TO_USER: &str = "❌ Could not deliver the message to the user.";

/// Longest topic name the Bot API accepts, in characters.
pub const MAX_TOPIC_NAME: usize = 128;

/// Info card posted as the first message of a new topic.
pub fn support_user_info(user_name: &str, user_id: i64) -> String {
    format!(
        "ℹ️ New request\n\n\
         👤 Name: {user_name}\n\
         🆔 ID: {user_id}\n\n\
         💬 Wait for the user's message or start the conversation. \
         Send /close here to end it."
    )
}

/// Topic title for a user, trimmed to the API limit.
pub fn topic_name(full_name: &str, user_id: i64) -> String {
    let name = full_name.trim();
    if name.is_empty() {
        return format!("User{}", user_id);
    }
    name.chars().take(MAX_TOPIC_NAME).collect()
}
