// Application state shared across handlers
// Contains the user/session store, chat storage and the reply generator

use crate::auth::AuthStore;
use crate::chat::ChatDb;
use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::inference::{InferenceClient, ReplyGenerator};
use std::sync::Arc;
use std::time::Duration;

/// State handed to every handler as `State<Arc<AppState>>`
#[derive(Clone)]
pub struct AppState {
    /// Users and sessions
    pub auth: AuthStore,
    /// Conversations and messages
    pub chat: ChatDb,
    /// Produces assistant replies
    pub replies: Arc<dyn ReplyGenerator>,
    /// Lifetime of a new session
    pub session_ttl: Duration,
    /// Number of stored messages forwarded as context
    pub history_window: usize,
}

impl AppState {
    /// Assemble state from its parts
    pub fn new(
        db: &Database,
        replies: Arc<dyn ReplyGenerator>,
        session_ttl: Duration,
        history_window: usize,
    ) -> Self {
        Self {
            auth: AuthStore::new(db),
            chat: ChatDb::new(db),
            replies,
            session_ttl,
            history_window,
        }
    }

    /// Build state from configuration, talking to the configured inference server
    pub fn from_config(db: &Database, config: &Config) -> Result<Self, AppError> {
        let client = InferenceClient::new(&config.inference.base_url, config.inference.timeout)?;
        Ok(Self::new(
            db,
            Arc::new(client),
            config.session.ttl,
            config.inference.history_window,
        ))
    }
}
