//! Terminal chat against the inference server
//!
//! [`client`] talks HTTP, [`history`] keeps the rolling context and
//! [`repl`] runs the read-input loop.

pub mod client;
pub mod history;
pub mod repl;

pub use client::{ChatBackend, ChatClient, ChatClientError, ChatParams, HealthStatus};
pub use history::{History, Turn, MAX_HISTORY};
pub use repl::{parse_command, run_repl, Command, ReplExit};
