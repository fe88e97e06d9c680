//! Chat data models
//!
//! Defines structures for conversations and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Title given to conversations the user has not named
pub const DEFAULT_TITLE: &str = "New Chat";

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant/AI
    Assistant,
}

impl MessageRole {
    /// Convert the role to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// A conversation thread owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// Unique identifier for the conversation
    pub id: String,
    /// Owning user
    pub user_id: i64,
    /// Title of the conversation
    pub title: String,
    /// When the conversation was created (Unix milliseconds)
    pub created_at: i64,
    /// When the conversation was last updated (Unix milliseconds)
    pub updated_at: i64,
}

impl Conversation {
    /// Create a new conversation
    pub fn new(id: String, user_id: i64, title: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id,
            user_id,
            title,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get created_at as DateTime
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        millis_to_datetime(self.created_at)
    }

    /// Get updated_at as DateTime
    pub fn updated_at_datetime(&self) -> DateTime<Utc> {
        millis_to_datetime(self.updated_at)
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Unique identifier for the message
    pub id: String,
    /// ID of the conversation this message belongs to
    pub conversation_id: String,
    /// Role of the message sender
    pub role: String, // Stored as "user" or "assistant" in DB
    /// Content of the message
    pub content: String,
    /// When the message was created (Unix milliseconds)
    pub created_at: i64,
}

impl Message {
    /// Create a new message
    pub fn new(id: String, conversation_id: String, role: MessageRole, content: String) -> Self {
        Self {
            id,
            conversation_id,
            role: role.as_str().to_string(),
            content,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Assistant reply to `prompt`, timestamped strictly after it so the
    /// pair keeps its order when listed by `created_at`.
    pub fn reply_to(prompt: &Message, id: String, content: String) -> Self {
        let mut reply = Self::new(
            id,
            prompt.conversation_id.clone(),
            MessageRole::Assistant,
            content,
        );
        reply.created_at = reply.created_at.max(prompt.created_at + 1);
        reply
    }

    /// Get the message role as enum
    pub fn role_enum(&self) -> MessageRole {
        MessageRole::from(self.role.as_str())
    }

    /// Get created_at as DateTime
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        millis_to_datetime(self.created_at)
    }
}

/// Convert a stored millisecond timestamp to `DateTime<Utc>`
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
