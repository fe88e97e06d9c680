//! Chat database operations
//!
//! Handles all database interactions for conversations and messages.
//! Every conversation lookup is scoped to the owning user, so a foreign
//! conversation id behaves exactly like a missing one.

use crate::chat::models::{Conversation, Message};
use crate::db::Database;
use crate::error::AppError;
use sqlx::AnyPool;
use tracing::debug;

/// Message columns as selected. MySQL reports `TEXT` as a blob through the
/// `Any` driver, so `content` is cast to a character type.
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, CAST(content AS CHAR) AS content, created_at";

/// Chat storage over the shared connection pool
#[derive(Clone)]
pub struct ChatDb {
    pool: AnyPool,
}

impl ChatDb {
    /// Create chat storage on top of an open database
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Get a user's conversations, ordered by most recently updated
    pub async fn list_conversations(&self, user_id: i64) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "SELECT id, user_id, title, created_at, updated_at FROM conversations WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    /// Get a conversation by ID if it belongs to `user_id`
    pub async fn get_conversation(
        &self,
        user_id: i64,
        id: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT id, user_id, title, created_at, updated_at FROM conversations WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Create a new conversation
    pub async fn create_conversation(&self, conversation: &Conversation) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(conversation.user_id)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Created conversation: {}", conversation.id);
        Ok(())
    }

    /// Update conversation title and updated_at timestamp
    ///
    /// Returns `false` when no conversation with this id belongs to the user.
    pub async fn rename_conversation(
        &self,
        user_id: i64,
        id: &str,
        title: &str,
    ) -> Result<bool, AppError> {
        let updated_at = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(title)
        .bind(updated_at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        debug!("Renamed conversation: {}", id);
        Ok(result.rows_affected() > 0)
    }

    /// Update conversation's updated_at timestamp (when new message is added)
    pub async fn touch_conversation(&self, id: &str) -> Result<(), AppError> {
        let updated_at = chrono::Utc::now().timestamp_millis();
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a conversation (cascades to messages)
    ///
    /// Returns `false` when no conversation with this id belongs to the user.
    pub async fn delete_conversation(&self, user_id: i64, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        debug!("Deleted conversation: {}", id);
        Ok(result.rows_affected() > 0)
    }

    /// Get all messages for a conversation, ordered by creation time
    pub async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        let query = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at ASC",
            MESSAGE_COLUMNS
        );
        let messages = sqlx::query_as::<_, Message>(&query)
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// The last `limit` messages of a conversation, oldest first
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, AppError> {
        let query = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at DESC LIMIT ?",
            MESSAGE_COLUMNS
        );
        let mut messages = sqlx::query_as::<_, Message>(&query)
        .bind(conversation_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Add a message to a conversation
    pub async fn add_message(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        // Update conversation's updated_at timestamp
        self.touch_conversation(&message.conversation_id).await?;

        debug!(
            "Added message {} to conversation {}",
            message.id, message.conversation_id
        );
        Ok(())
    }
}
