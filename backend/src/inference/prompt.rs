//! Instruction-format prompts
//!
//! User turns are wrapped as `[INST] ... [/INST]`; assistant turns are
//! inserted verbatim. The model's reply is whatever follows the last
//! `[/INST]` marker.

use serde::{Deserialize, Serialize};

const INST_OPEN: &str = "[INST]";
const INST_CLOSE: &str = "[/INST]";

/// One prior turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" or "assistant"; anything other than "user" is treated as a
    /// model turn
    #[serde(default = "default_role")]
    pub role: String,
    /// Turn text
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl ChatTurn {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Whether this turn came from the user
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// Build the prompt for `message` following `history`
pub fn format_prompt(history: &[ChatTurn], message: &str) -> String {
    let mut parts: Vec<String> = history
        .iter()
        .map(|turn| {
            if turn.is_user() {
                format!("{} {} {}", INST_OPEN, turn.content, INST_CLOSE)
            } else {
                turn.content.clone()
            }
        })
        .collect();

    parts.push(format!("{} {} {}", INST_OPEN, message, INST_CLOSE));
    parts.join(" ")
}

/// Take the model's answer out of the generated text
pub fn extract_reply(generated: &str) -> String {
    match generated.rfind(INST_CLOSE) {
        Some(pos) => generated[pos + INST_CLOSE.len()..].trim().to_string(),
        None => generated.trim().to_string(),
    }
}

/// Keep only the last `max_turns` entries
pub fn truncate_history<T>(history: &mut Vec<T>, max_turns: usize) {
    if history.len() > max_turns {
        let excess = history.len() - max_turns;
        history.drain(..excess);
    }
}
