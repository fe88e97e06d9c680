//! HTTP client for the inference server's chat endpoints

use crate::chat::history::Turn;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Time allowed for the start-up health check
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors talking to the inference server
#[derive(Error, Debug)]
pub enum ChatClientError {
    /// The server could not be reached
    #[error("Cannot connect to server. Is it running?")]
    Connect,

    /// The server took longer than the configured timeout
    #[error("Request timed out. The model may still be loading.")]
    Timeout,

    /// The server answered with an error status
    #[error("Server returned {status}: {detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `detail` from the error body, or the raw body
        detail: String,
    },

    /// Any other transport or decoding failure
    #[error("Request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for ChatClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatClientError::Timeout
        } else if e.is_connect() {
            ChatClientError::Connect
        } else {
            ChatClientError::Request(e)
        }
    }
}

/// Outcome of the start-up health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// `/health` answered 200
    Online,
    /// The server answered, with this non-200 status
    NotReady(u16),
}

/// Sampling settings sent with every message
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatParams {
    /// Maximum new tokens
    pub max_length: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling probability
    pub top_p: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            max_length: 512,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Something that answers chat messages
#[async_trait]
pub trait ChatBackend {
    /// Reply to `message` given the prior turns
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatClientError>;
}

#[derive(Serialize)]
struct ConversationRequest<'a> {
    message: &'a str,
    history: &'a [Turn],
    #[serde(flatten)]
    params: ChatParams,
}

#[derive(Deserialize)]
struct ConversationResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Client for one inference server
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    params: ChatParams,
}

impl ChatClient {
    /// Create a client; `timeout` bounds each chat request
    pub fn new(base_url: &str, timeout: Duration, params: ChatParams) -> Result<Self, ChatClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ChatClientError::Request)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            params,
        })
    }

    /// The server this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ChatClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await?;

        if response.status() == StatusCode::OK {
            Ok(HealthStatus::Online)
        } else {
            Ok(HealthStatus::NotReady(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatClientError> {
        let url = format!("{}/chat/conversation", self.base_url);
        debug!(url = %url, history_len = history.len(), "Sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ConversationRequest {
                message,
                history,
                params: self.params,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(ChatClientError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ConversationResponse = response.json().await?;
        Ok(body.response)
    }
}
