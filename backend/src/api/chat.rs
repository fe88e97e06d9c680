//! Chat API endpoints
//!
//! Handles HTTP requests for conversations and messages. Every handler is
//! scoped to the signed-in user; a conversation owned by someone else is
//! reported as not found.

use crate::auth::CurrentUser;
use crate::chat::{Conversation, Message, MessageRole, DEFAULT_TITLE};
use crate::error::{ApiJson, AppError};
use crate::inference::{truncate_history, ChatTurn};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Longest accepted conversation title
pub const MAX_TITLE_LENGTH: usize = 255;

/// Request to create a new conversation
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional title ("New Chat" if not provided)
    pub title: Option<String>,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message content
    pub content: String,
}

/// Request to update conversation title
#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    /// New title
    pub title: String,
}

/// Conversation as listed for its owner
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// Conversation unique identifier
    pub id: String,
    /// Conversation title
    pub title: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            created_at: c.created_at_datetime(),
            updated_at: c.updated_at_datetime(),
            id: c.id,
            title: c.title,
        }
    }
}

/// Newly created conversation
#[derive(Debug, Serialize)]
pub struct CreatedConversationResponse {
    /// Conversation unique identifier
    pub id: String,
    /// Conversation title
    pub title: String,
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message unique identifier
    pub id: String,
    /// Message content
    pub content: String,
    /// Message role ("user" or "assistant")
    pub role: String,
    /// When the message was stored
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            created_at: m.created_at_datetime(),
            id: m.id,
            content: m.content,
            role: m.role,
        }
    }
}

/// The stored user message and the reply it received
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// What the user sent
    pub user_message: MessageResponse,
    /// The assistant's reply
    pub ai_message: MessageResponse,
}

/// Title change confirmation
#[derive(Debug, Serialize)]
pub struct UpdateTitleResponse {
    /// Human-readable message
    pub message: String,
    /// The new title
    pub title: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    /// Human-readable message
    pub message: String,
}

fn conversation_not_found() -> AppError {
    AppError::NotFound("Conversation not found".to_string())
}

/// GET /api/conversations - List the user's conversations, newest activity first
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let conversations = state.chat.list_conversations(current.user.id).await?;
    Ok(Json(
        conversations
            .into_iter()
            .map(ConversationResponse::from)
            .collect(),
    ))
}

/// POST /api/conversations - Create a new conversation
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    request: Option<Json<CreateConversationRequest>>,
) -> Result<Json<CreatedConversationResponse>, AppError> {
    let title = request
        .and_then(|Json(r)| r.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    validate_title(&title)?;

    let conversation = Conversation::new(Uuid::new_v4().to_string(), current.user.id, title);
    state.chat.create_conversation(&conversation).await?;

    info!(
        conversation_id = %conversation.id,
        user_id = current.user.id,
        "Created conversation"
    );

    Ok(Json(CreatedConversationResponse {
        id: conversation.id,
        title: conversation.title,
    }))
}

/// GET /api/conversations/:id/messages - Messages in chronological order
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    state
        .chat
        .get_conversation(current.user.id, &id)
        .await?
        .ok_or_else(conversation_not_found)?;

    let messages = state.chat.get_messages(&id).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// POST /api/conversations/:id/messages - Store a message and the assistant's reply
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    if request.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }

    state
        .chat
        .get_conversation(current.user.id, &id)
        .await?
        .ok_or_else(conversation_not_found)?;

    // Context is what came before this message
    let recent = state
        .chat
        .recent_messages(&id, state.history_window.max(1))
        .await?;

    let mut user_message = Message::new(
        Uuid::new_v4().to_string(),
        id.clone(),
        MessageRole::User,
        request.content,
    );
    if let Some(last) = recent.last() {
        user_message.created_at = user_message.created_at.max(last.created_at + 1);
    }

    let mut history: Vec<ChatTurn> = recent
        .into_iter()
        .map(|m| match m.role_enum() {
            MessageRole::User => ChatTurn::user(m.content),
            MessageRole::Assistant => ChatTurn::assistant(m.content),
        })
        .collect();
    truncate_history(&mut history, state.history_window);

    state.chat.add_message(&user_message).await?;

    let reply = state.replies.reply(&history, &user_message.content).await;

    let ai_message = Message::reply_to(&user_message, Uuid::new_v4().to_string(), reply);
    state.chat.add_message(&ai_message).await?;

    info!(
        conversation_id = %id,
        history_len = history.len(),
        "Stored message and reply"
    );

    Ok(Json(SendMessageResponse {
        user_message: user_message.into(),
        ai_message: ai_message.into(),
    }))
}

/// PATCH /api/conversations/:id - Rename a conversation
pub async fn update_conversation_title(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateTitleRequest>,
) -> Result<Json<UpdateTitleResponse>, AppError> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    validate_title(&title)?;

    if !state
        .chat
        .rename_conversation(current.user.id, &id, &title)
        .await?
    {
        return Err(conversation_not_found());
    }

    Ok(Json(UpdateTitleResponse {
        message: "Conversation updated successfully".to_string(),
        title,
    }))
}

/// DELETE /api/conversations/:id - Delete a conversation and its messages
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, AppError> {
    if !state.chat.delete_conversation(current.user.id, &id).await? {
        return Err(conversation_not_found());
    }

    info!(conversation_id = %id, user_id = current.user.id, "Deleted conversation");
    Ok(Json(StatusMessage {
        message: "Conversation deleted successfully".to_string(),
    }))
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::Validation(format!(
            "Title exceeds maximum length of {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{
        create_test_state, create_test_state_with, sign_in, CannedReplies,
    };

    #[tokio::test]
    async fn test_list_conversations_empty() {
        let (state, _temp_dir) = create_test_state().await;
        let current = sign_in(&state, "ada@example.com").await;

        let result = list_conversations(State(state), current).await.unwrap();
        assert!(result.0.is_empty());
    }

    #[tokio::test]
    async fn test_create_conversation_default_and_custom_title() {
        let (state, _temp_dir) = create_test_state().await;
        let current = sign_in(&state, "ada@example.com").await;

        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();
        assert_eq!(created.title, "New Chat");

        let request = CreateConversationRequest {
            title: Some("  Sleep  ".to_string()),
        };
        let Json(created) = create_conversation(State(state.clone()), current.clone(), Some(Json(request)))
            .await
            .unwrap();
        assert_eq!(created.title, "Sleep");

        let list = list_conversations(State(state), current).await.unwrap();
        assert_eq!(list.0.len(), 2);
    }

    #[tokio::test]
    async fn test_send_message_stores_both_turns() {
        let replies = CannedReplies::new("Breathe slowly.");
        let (state, _temp_dir) = create_test_state_with(replies.clone(), 20).await;
        let current = sign_in(&state, "ada@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();

        let response = send_message(
            State(state.clone()),
            current.clone(),
            Path(created.id.clone()),
            ApiJson(SendMessageRequest {
                content: "I feel anxious".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.user_message.role, "user");
        assert_eq!(response.user_message.content, "I feel anxious");
        assert_eq!(response.ai_message.role, "assistant");
        assert_eq!(response.ai_message.content, "Breathe slowly.");
        assert!(response.ai_message.created_at > response.user_message.created_at);

        let messages = get_messages(State(state), current, Path(created.id))
            .await
            .unwrap();
        let roles: Vec<&str> = messages.0.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant"]);

        let calls = replies.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.is_empty());
        assert_eq!(calls[0].1, "I feel anxious");
    }

    #[tokio::test]
    async fn test_send_message_forwards_recent_history() {
        let replies = CannedReplies::new("ok");
        let (state, _temp_dir) = create_test_state_with(replies.clone(), 2).await;
        let current = sign_in(&state, "ada@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();

        for content in ["first", "second", "third"] {
            send_message(
                State(state.clone()),
                current.clone(),
                Path(created.id.clone()),
                ApiJson(SendMessageRequest {
                    content: content.to_string(),
                }),
            )
            .await
            .unwrap();
        }

        let calls = replies.calls();
        assert_eq!(calls.len(), 3);
        // Window of two: the previous user turn and its reply
        assert_eq!(
            calls[2].0,
            vec![ChatTurn::user("second"), ChatTurn::assistant("ok")]
        );
        assert_eq!(calls[2].1, "third");
    }

    #[tokio::test]
    async fn test_zero_history_window_sends_no_context() {
        let replies = CannedReplies::new("ok");
        let (state, _temp_dir) = create_test_state_with(replies.clone(), 0).await;
        let current = sign_in(&state, "ada@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();

        for content in ["first", "second"] {
            send_message(
                State(state.clone()),
                current.clone(),
                Path(created.id.clone()),
                ApiJson(SendMessageRequest {
                    content: content.to_string(),
                }),
            )
            .await
            .unwrap();
        }

        let calls = replies.calls();
        assert!(calls[1].0.is_empty());

        // Ordering still follows the previous message
        let messages = state.chat.get_messages(&created.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "ok", "second", "ok"]);
    }

    #[tokio::test]
    async fn test_send_empty_message_rejected() {
        let (state, _temp_dir) = create_test_state().await;
        let current = sign_in(&state, "ada@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();

        let result = send_message(
            State(state),
            current,
            Path(created.id),
            ApiJson(SendMessageRequest {
                content: "  ".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_other_users_conversation_is_not_found() {
        let (state, _temp_dir) = create_test_state().await;
        let owner = sign_in(&state, "ada@example.com").await;
        let other = sign_in(&state, "charles@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), owner.clone(), None)
            .await
            .unwrap();

        let result = get_messages(State(state.clone()), other.clone(), Path(created.id.clone())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = update_conversation_title(
            State(state.clone()),
            other.clone(),
            Path(created.id.clone()),
            ApiJson(UpdateTitleRequest {
                title: "Mine now".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = delete_conversation(State(state.clone()), other, Path(created.id.clone())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Still there for the owner
        assert!(get_messages(State(state), owner, Path(created.id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let (state, _temp_dir) = create_test_state().await;
        let current = sign_in(&state, "ada@example.com").await;
        let Json(created) = create_conversation(State(state.clone()), current.clone(), None)
            .await
            .unwrap();

        let empty = update_conversation_title(
            State(state.clone()),
            current.clone(),
            Path(created.id.clone()),
            ApiJson(UpdateTitleRequest {
                title: "   ".to_string(),
            }),
        )
        .await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let renamed = update_conversation_title(
            State(state.clone()),
            current.clone(),
            Path(created.id.clone()),
            ApiJson(UpdateTitleRequest {
                title: "Work stress".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(renamed.title, "Work stress");
        assert_eq!(renamed.message, "Conversation updated successfully");

        send_message(
            State(state.clone()),
            current.clone(),
            Path(created.id.clone()),
            ApiJson(SendMessageRequest {
                content: "hello".to_string(),
            }),
        )
        .await
        .unwrap();

        let deleted = delete_conversation(State(state.clone()), current.clone(), Path(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(deleted.message, "Conversation deleted successfully");

        assert!(state.chat.get_messages(&created.id).await.unwrap().is_empty());
        let result = get_messages(State(state), current, Path(created.id)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
