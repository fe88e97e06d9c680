//! Authentication API handlers
//!
//! Signup and login both start a session: the token is returned in the body
//! and set as an HttpOnly cookie so browser and script clients both work.
//! Cookie headers are read and written through [`CookieJar`].

use crate::auth::models::UserResponse;
use crate::auth::validation::{normalize_email, normalize_name, validate_password};
use crate::auth::{
    hash_password, session_cookie, session_token_from_headers, verify_password, CurrentUser,
    User, SESSION_COOKIE,
};
use crate::error::{ApiJson, AppError};
use crate::state::AppState;
use anyhow::anyhow;
use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Signup request
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Login email
    pub email: String,
    /// Plain-text password (hashed before storage)
    pub password: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email
    pub email: String,
    /// Plain-text password
    pub password: String,
}

/// Response to a successful signup or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Human-readable message
    pub message: String,
    /// Token to send back as cookie or bearer header
    pub session_token: String,
    /// The signed-in user
    pub user: UserResponse,
}

/// Response carrying only the current user
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// The signed-in user
    pub user: UserResponse,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable message
    pub message: String,
}

/// POST /api/auth/signup - Create an account and sign in
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = normalize_email(&request.email)?;
    validate_password(&request.password)?;
    let first_name = normalize_name("First name", &request.first_name)?;
    let last_name = normalize_name("Last name", &request.last_name)?;

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow!("Password hashing task failed: {}", e)))??;

    let user = state
        .auth
        .create_user(&email, &password_hash, &first_name, &last_name)
        .await?;

    start_session(&state, user, "User created successfully").await
}

/// POST /api/auth/login - Verify credentials and sign in
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = request.email.trim().to_lowercase();
    let credentials = state
        .auth
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let password = request.password;
    let hash = credentials.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow!("Password check task failed: {}", e)))?;

    if !valid {
        warn!(user_id = credentials.id, "Failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    start_session(&state, User::from(credentials), "Login successful").await
}

/// POST /api/auth/logout - End the current session, if any
///
/// A session cookie sent with the request is cleared in the response.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    if let Some(token) = session_token_from_headers(&headers) {
        state.auth.delete_session(&token).await?;
    }

    let jar = CookieJar::from_headers(&headers).remove(Cookie::build(SESSION_COOKIE).path("/"));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// GET /api/auth/me - The signed-in user
pub async fn me(current: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserResponse::from(&current.user),
    })
}

async fn start_session(
    state: &AppState,
    user: User,
    message: &str,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = state.auth.create_session(user.id, state.session_ttl).await?;
    info!(user_id = user.id, "Session started");

    let jar = CookieJar::new().add(session_cookie(token.clone(), state.session_ttl));

    Ok((
        jar,
        Json(AuthResponse {
            message: message.to_string(),
            session_token: token,
            user: UserResponse::from(&user),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::create_test_state;
    use axum::extract::FromRequestParts;
    use axum::http::{header, HeaderValue, Request};
    use axum::response::IntoResponse;

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: "correct horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_sets_cookie_and_session() {
        let (state, _temp_dir) = create_test_state().await;

        let (jar, response) = signup(State(state.clone()), ApiJson(signup_request(" Ada@Example.com ")))
            .await
            .unwrap();

        assert_eq!(response.message, "User created successfully");
        assert_eq!(response.user.email, "ada@example.com");
        assert_eq!(response.session_token.len(), 43);

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.value(), response.session_token);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));

        let user = state
            .auth
            .user_for_session(&response.session_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, response.user.id);
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let (state, _temp_dir) = create_test_state().await;
        signup(State(state.clone()), ApiJson(signup_request("ada@example.com")))
            .await
            .unwrap();

        let result = signup(State(state), ApiJson(signup_request("ADA@example.com"))).await;
        assert!(matches!(result, Err(AppError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let (state, _temp_dir) = create_test_state().await;
        let mut request = signup_request("not-an-email");
        let result = signup(State(state.clone()), ApiJson(request)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        request = signup_request("ada@example.com");
        request.first_name = "  ".to_string();
        let result = signup(State(state), ApiJson(request)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login() {
        let (state, _temp_dir) = create_test_state().await;
        signup(State(state.clone()), ApiJson(signup_request("ada@example.com")))
            .await
            .unwrap();

        let (_, response) = login(
            State(state.clone()),
            ApiJson(LoginRequest {
                email: "Ada@Example.com".to_string(),
                password: "correct horse".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.message, "Login successful");
        assert_eq!(response.user.first_name, "Ada");

        let wrong_password = login(
            State(state.clone()),
            ApiJson(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "battery staple".to_string(),
            }),
        )
        .await;
        assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));

        let unknown = login(
            State(state),
            ApiJson(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "correct horse".to_string(),
            }),
        )
        .await;
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (state, _temp_dir) = create_test_state().await;
        let (_, response) = signup(State(state.clone()), ApiJson(signup_request("ada@example.com")))
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, response.session_token)).unwrap(),
        );
        let (jar, body) = logout(State(state.clone()), headers).await.unwrap();

        assert_eq!(body.message, "Logged out successfully");
        assert!(jar.get(SESSION_COOKIE).is_none());
        let cleared = (jar, body).into_response();
        let set_cookie = cleared.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session_token=;"));
        assert!(set_cookie.contains("Max-Age=0"));
        assert!(state
            .auth
            .user_for_session(&response.session_token)
            .await
            .unwrap()
            .is_none());

        // Logging out by bearer token, or without a session, still succeeds
        let (_, response) = login(
            State(state.clone()),
            ApiJson(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            }),
        )
        .await
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", response.session_token)).unwrap(),
        );
        assert!(logout(State(state.clone()), headers).await.is_ok());
        assert!(state
            .auth
            .user_for_session(&response.session_token)
            .await
            .unwrap()
            .is_none());
        assert!(logout(State(state), HeaderMap::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_me_via_cookie() {
        let (state, _temp_dir) = create_test_state().await;
        let (_, response) = signup(State(state.clone()), ApiJson(signup_request("ada@example.com")))
            .await
            .unwrap();

        let request = Request::builder()
            .header(
                header::COOKIE,
                format!("session_token={}", response.session_token),
            )
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let current = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        let me_response = me(current).await;
        assert_eq!(me_response.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (state, _temp_dir) = create_test_state().await;
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer not-a-session")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AppError::InvalidSession)));
    }
}
