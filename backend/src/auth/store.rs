//! User and session persistence

use crate::auth::models::{User, UserCredentials};
use crate::auth::token::generate_session_token;
use crate::db::Database;
use crate::error::AppError;
use chrono::Utc;
use sqlx::AnyPool;
use std::time::Duration;
use tracing::{debug, info};

/// Users and sessions over the shared connection pool
#[derive(Clone)]
pub struct AuthStore {
    pool: AnyPool,
}

impl AuthStore {
    /// Create the store on top of an open database
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Insert a new user
    ///
    /// # Errors
    /// * `AppError::EmailTaken` if the email already has an account
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AppError> {
        let created_at = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::EmailTaken,
            _ => AppError::Database(e),
        })?;

        let id = match result.last_insert_id() {
            Some(id) => id,
            None => self
                .find_user_by_email(email)
                .await?
                .map(|u| u.id)
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Inserted user not found")))?,
        };

        info!(user_id = id, "Created user");
        Ok(User {
            id,
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at,
        })
    }

    /// Look up a user (with password hash) by email
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let user = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash, first_name, last_name, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Start a session for `user_id` lasting `ttl`; returns the token
    pub async fn create_session(&self, user_id: i64, ttl: Duration) -> Result<String, AppError> {
        let token = generate_session_token();
        let now = Utc::now().timestamp_millis();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_millis);

        sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .bind(now)
            .execute(&self.pool)
            .await?;

        debug!(user_id, "Created session");
        Ok(token)
    }

    /// Resolve a session token to its user, ignoring expired sessions
    pub async fn user_for_session(&self, token: &str) -> Result<Option<User>, AppError> {
        let now = Utc::now().timestamp_millis();
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.first_name, u.last_name, u.created_at \
             FROM users u JOIN sessions s ON u.id = s.user_id \
             WHERE s.id = ? AND s.expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// End a session; unknown tokens are ignored
    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every expired session; returns how many were removed
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
