//! Request authentication
//!
//! The session token travels either in the `session_token` cookie (browser
//! front end) or as `Authorization: Bearer <token>` (scripts, mobile).

use crate::auth::models::User;
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use std::time::Duration;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

/// Find the session token in request headers (cookie first, then bearer)
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// HttpOnly, `SameSite=Lax` cookie carrying `token` for `ttl`
pub fn session_cookie(token: String, ttl: Duration) -> Cookie<'static> {
    let max_age = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// The authenticated user of the current request
///
/// Rejects with 401 when no token is present or the session is unknown or
/// expired.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The user the session belongs to
    pub user: User,
    /// The token that authenticated this request
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token_from_headers(&parts.headers).ok_or(AppError::NotAuthenticated)?;

        let user = state
            .auth
            .user_for_session(&token)
            .await?
            .ok_or(AppError::InvalidSession)?;

        Ok(CurrentUser { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=abc123; lang=en"),
        );
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_token=cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("cookie"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        let mut headers = HeaderMap::new();
        assert!(session_token_from_headers(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("session_token="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(session_token_from_headers(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), Duration::from_secs(30 * 86_400));
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let header = cookie.to_string();
        assert!(header.contains("Max-Age=2592000"));

        let forever = session_cookie("abc".to_string(), Duration::from_secs(u64::MAX));
        assert_eq!(forever.max_age(), Some(time::Duration::MAX));
    }
}
