//! User records

use crate::chat::models::millis_to_datetime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A registered user, as exposed to the owner
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Database id
    pub id: i64,
    /// Login email (stored lower-cased)
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup time (Unix milliseconds)
    pub created_at: i64,
}

/// A user row including the password hash, used only during login
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    /// Database id
    pub id: i64,
    /// Login email
    pub email: String,
    /// bcrypt hash
    pub password_hash: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup time (Unix milliseconds)
    pub created_at: i64,
}

impl From<UserCredentials> for User {
    fn from(c: UserCredentials) -> Self {
        Self {
            id: c.id,
            email: c.email,
            first_name: c.first_name,
            last_name: c.last_name,
            created_at: c.created_at,
        }
    }
}

/// User as serialized in API responses
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    /// Database id
    pub id: i64,
    /// Login email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Signup time
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            created_at: millis_to_datetime(u.created_at),
        }
    }
}
