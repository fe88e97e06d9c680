//! HTTP surface of the inference server
//!
//! Accepts a message (and optionally prior turns), builds the instruction
//! prompt and hands it to the configured [`TextGenerator`].

use crate::error::{ApiJson, AppError};
use crate::inference::generator::TextGenerator;
use crate::inference::params::GenerationParams;
use crate::inference::prompt::{format_prompt, ChatTurn};
use crate::middleware::request_id_middleware;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state of the inference server
pub struct InferenceState {
    /// Backend doing the actual generation
    pub generator: Arc<dyn TextGenerator>,
}

impl InferenceState {
    /// Wrap a generator
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Static description of the served model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Display name
    pub model: String,
    /// Fine-tune version
    pub version: String,
    /// Base model the adapter was trained on
    pub base: String,
}

impl ModelInfo {
    /// The fine-tuned counseling model
    pub fn current() -> Self {
        Self {
            model: "Mistral-7B Mental Health Counselor".to_string(),
            version: "1.0.0".to_string(),
            base: "mistralai/Mistral-7B-Instruct-v0.3".to_string(),
        }
    }
}

/// Liveness response for `/` and `/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// "online", "healthy" or "unhealthy"
    pub status: String,
    /// Whether the generator can serve requests
    pub model_loaded: bool,
    /// Where generation runs
    pub device: String,
}

/// Single-turn chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    #[serde(default)]
    pub message: String,
    /// Maximum new tokens
    pub max_length: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling probability
    pub top_p: Option<f32>,
}

/// Chat request carrying prior turns
#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    /// The user's message
    #[serde(default)]
    pub message: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Maximum new tokens
    pub max_length: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling probability
    pub top_p: Option<f32>,
}

/// Generated reply
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The model's answer
    pub response: String,
    /// Which model produced it
    pub model_info: ModelInfo,
}

/// Build the inference server router
pub fn router(state: Arc<InferenceState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/conversation", post(chat_conversation))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - Liveness with model status
pub async fn root(State(state): State<Arc<InferenceState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        model_loaded: state.generator.is_ready().await,
        device: state.generator.device(),
    })
}

/// GET /health - Healthy only when the model can serve requests
pub async fn health(State(state): State<Arc<InferenceState>>) -> Json<StatusResponse> {
    let model_loaded = state.generator.is_ready().await;
    Json(StatusResponse {
        status: if model_loaded { "healthy" } else { "unhealthy" }.to_string(),
        model_loaded,
        device: state.generator.device(),
    })
}

/// POST /chat - Reply to a single message
pub async fn chat(
    State(state): State<Arc<InferenceState>>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    ensure_ready(&state).await?;
    let params =
        GenerationParams::from_request(request.max_length, request.temperature, request.top_p)?;
    generate_reply(&state, &[], &request.message, &params).await
}

/// POST /chat/conversation - Reply to a message given prior turns
pub async fn chat_conversation(
    State(state): State<Arc<InferenceState>>,
    ApiJson(request): ApiJson<ConversationRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    ensure_ready(&state).await?;
    let params =
        GenerationParams::from_request(request.max_length, request.temperature, request.top_p)?;
    generate_reply(&state, &request.history, &request.message, &params).await
}

/// A model that is not loaded answers 503 before any input is checked
async fn ensure_ready(state: &InferenceState) -> Result<(), AppError> {
    if state.generator.is_ready().await {
        Ok(())
    } else {
        warn!("Chat request received while model is not loaded");
        Err(AppError::ModelNotLoaded)
    }
}

async fn generate_reply(
    state: &InferenceState,
    history: &[ChatTurn],
    message: &str,
    params: &GenerationParams,
) -> Result<Json<ChatResponse>, AppError> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let prompt = format_prompt(history, message);
    let start = Instant::now();

    let response = state
        .generator
        .generate(&prompt, params)
        .await
        .map_err(|e| match e {
            AppError::Generation(_) => e,
            other => AppError::Generation(other.to_string()),
        })?;

    info!(
        history_len = history.len(),
        reply_len = response.len(),
        duration_ms = start.elapsed().as_millis(),
        "Generated reply"
    );

    Ok(Json(ChatResponse {
        response,
        model_info: ModelInfo::current(),
    }))
}
