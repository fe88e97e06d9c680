//! Model inference
//!
//! Both ends of the model call live here: the HTTP endpoint that formats
//! prompts and forwards them to a model server ([`server`], [`generator`]),
//! and the client the chat API uses to obtain replies ([`client`]).

pub mod client;
pub mod generator;
pub mod params;
pub mod prompt;
pub mod server;

pub use client::{InferenceClient, ReplyGenerator};
pub use generator::{CompletionsGenerator, TextGenerator};
pub use params::GenerationParams;
pub use prompt::{extract_reply, format_prompt, truncate_history, ChatTurn};
