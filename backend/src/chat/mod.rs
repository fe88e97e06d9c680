//! Chat module
//!
//! Handles chat conversations and messages storage.

pub mod db;
pub mod models;

pub use db::ChatDb;
pub use models::{Conversation, Message, MessageRole, DEFAULT_TITLE};
