//! API module
//!
//! HTTP handlers for authentication and chat history, and the router that
//! wires them together.

pub mod auth;
pub mod chat;
pub mod health;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

/// Build the auth/chat API router
///
/// # Arguments
/// * `state` - Shared stores and reply generator
/// * `cors_origin` - The single browser origin allowed to send credentials
pub fn router(state: Arc<AppState>, cors_origin: &str) -> Result<Router, AppError> {
    let origin = HeaderValue::from_str(cors_origin)
        .map_err(|_| AppError::Config(format!("Invalid CORS origin: {}", cors_origin)))?;

    // Credentialed CORS cannot use wildcards, so mirror the request instead
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    Ok(Router::new()
        .route("/api/health", get(health::health_check))
        // Authentication
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Conversations
        .route(
            "/api/conversations",
            get(chat::list_conversations).post(chat::create_conversation),
        )
        .route(
            "/api/conversations/:id",
            patch(chat::update_conversation_title).delete(chat::delete_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(chat::get_messages).post(chat::send_message),
        )
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors)
        .with_state(state))
}
