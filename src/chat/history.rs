//! Rolling conversation history for the terminal chat

use serde::{Deserialize, Serialize};

/// Messages kept as context (ten exchanges)
pub const MAX_HISTORY: usize = 20;

/// One message of the conversation, as sent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
}

/// Conversation so far, oldest first, capped at a fixed number of messages
#[derive(Debug, Clone)]
pub struct History {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl History {
    /// Empty history keeping at most `max_turns` messages
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Record a completed exchange, dropping the oldest messages past the cap
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        self.turns.push(Turn {
            role: "user".to_string(),
            content: user.to_string(),
        });
        self.turns.push(Turn {
            role: "assistant".to_string(),
            content: assistant.to_string(),
        });

        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The stored turns
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Whether nothing has been said yet
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Numbered lines, `You` for user turns and `AI` for the rest
    pub fn render(&self) -> Vec<String> {
        self.turns
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                let who = if turn.role == "user" { "You" } else { "AI" };
                format!("{}. {}: {}", i + 1, who, turn.content)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_render() {
        let mut history = History::default();
        assert!(history.is_empty());

        history.push_exchange("hi", "hello");
        assert_eq!(history.render(), vec!["1. You: hi", "2. AI: hello"]);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_keeps_last_twenty_messages() {
        let mut history = History::default();
        for i in 0..11 {
            history.push_exchange(&format!("q{}", i), &format!("a{}", i));
        }
        assert_eq!(history.turns().len(), MAX_HISTORY);
        assert_eq!(history.turns()[0].content, "q1");
        assert_eq!(history.turns()[19].content, "a10");
    }
}
