//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.
//!
//! Client-facing variants carry their message through to the response body.
//! Database and internal errors are logged in full and answered with a generic
//! message so SQL and file paths never reach the caller.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application-level error types
///
/// Each variant maps to one HTTP status code via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// No session token was supplied with the request
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The supplied session token is unknown or has expired
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Login failed (unknown email or wrong password)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Signup with an email that already has an account
    #[error("Email already registered")]
    EmailTaken,

    /// A conversation (or other resource) was not found for this user
    #[error("{0}")]
    NotFound(String),

    /// Request body failed validation
    #[error("{0}")]
    Validation(String),

    /// The model backend is not ready to serve generations
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// The model backend failed while generating
    #[error("Generation error: {0}")]
    Generation(String),

    /// Server configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error returned by the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status code this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated
            | AppError::InvalidSession
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::EmailTaken | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Generation(_)
            | AppError::Config(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the `{"detail", "status"}` body
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            AppError::Database(e) => {
                error!(error = %e, "database error");
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal server error");
                "Internal server error".to_string()
            }
            AppError::Config(msg) => {
                error!(message = %msg, "configuration error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "detail": detail,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
