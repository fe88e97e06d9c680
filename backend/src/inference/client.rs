//! Client for the inference server, used by the chat API
//!
//! Replies never fail from the caller's point of view: every failure is
//! logged and turned into an apology the user sees as the assistant message.

use crate::error::AppError;
use crate::inference::prompt::ChatTurn;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// Shown when the inference server cannot be reached
pub const CONNECT_APOLOGY: &str = "I'm having trouble connecting to the counseling server. \
The server may be offline. Please try again in a few minutes.";

/// Shown when generation takes longer than the configured timeout
pub const TIMEOUT_APOLOGY: &str = "I apologize, but the response is taking too long. \
Please try asking a shorter, simpler question.";

/// Shown for error statuses and unreadable responses
pub const FAILURE_APOLOGY: &str = "I'm having trouble connecting to the counseling model \
right now. Please try again in a moment.";

/// Shown when the server answers without a `response` field
pub const EMPTY_APOLOGY: &str = "I apologize, but I could not generate a response.";

/// Produces the assistant's reply to a user message
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Reply to `message`, given the preceding turns (oldest first)
    async fn reply(&self, history: &[ChatTurn], message: &str) -> String;
}

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    message: &'a str,
    history: &'a [ChatTurn],
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    response: Option<String>,
}

/// HTTP client for `POST {base_url}/chat/conversation`
#[derive(Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    /// Create a client with a total per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request_reply(&self, history: &[ChatTurn], message: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/chat/conversation", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ConversationRequest { message, history })
            .send()
            .await?
            .error_for_status()?;

        let body: ConversationResponse = response.json().await?;
        Ok(body.response.unwrap_or_else(|| EMPTY_APOLOGY.to_string()))
    }
}

#[async_trait]
impl ReplyGenerator for InferenceClient {
    async fn reply(&self, history: &[ChatTurn], message: &str) -> String {
        info!(
            history_len = history.len(),
            message_len = message.len(),
            "Requesting reply from inference server"
        );

        match self.request_reply(history, message).await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => {
                warn!(error = %e, "Inference request timed out");
                TIMEOUT_APOLOGY.to_string()
            }
            Err(e) if e.is_connect() => {
                error!(error = %e, "Cannot connect to inference server");
                CONNECT_APOLOGY.to_string()
            }
            Err(e) => {
                error!(
                    error = %e,
                    status = e.status().map(|s| s.as_u16()),
                    "Inference request failed"
                );
                FAILURE_APOLOGY.to_string()
            }
        }
    }
}
