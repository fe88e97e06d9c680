//! The read-input loop of the terminal chat

use crate::chat::client::ChatBackend;
use crate::chat::history::History;
use std::future::Future;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Why the chat loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// The user typed a quit command
    Quit,
    /// Input reached end of file
    EndOfInput,
    /// The shutdown future completed (Ctrl-C)
    Interrupted,
}

/// What a line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line
    Empty,
    /// `quit`, `exit` or `q`
    Quit,
    /// `clear`
    Clear,
    /// `history`
    History,
    /// Anything else is sent to the model
    Message(String),
}

/// Classify one line of input (commands are case-insensitive)
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    match trimmed.to_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "clear" => Command::Clear,
        "history" => Command::History,
        _ => Command::Message(trimmed.to_string()),
    }
}

fn print_banner<W: Write>(out: &mut W) -> io::Result<()> {
    let rule = "-".repeat(80);
    writeln!(out, "💬 Chat Interface")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Commands:")?;
    writeln!(out, "  • Type your message and press Enter to chat")?;
    writeln!(out, "  • 'clear' - Clear conversation history")?;
    writeln!(out, "  • 'history' - Show conversation history")?;
    writeln!(out, "  • 'quit' or 'exit' - Exit the chat")?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "\nStart chatting! I'm here to support you.\n")
}

/// Run the chat loop until `quit`, end of input or `shutdown`
///
/// Server errors are printed and the loop continues; only I/O errors on
/// `input`/`out` end it early. `shutdown` is watched while waiting for
/// input and while waiting for a reply.
pub async fn run_repl<R, W, B, S>(
    mut input: R,
    out: &mut W,
    backend: &B,
    history: &mut History,
    shutdown: S,
) -> io::Result<ReplExit>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    B: ChatBackend + Sync,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    print_banner(out)?;

    let mut line = String::new();
    loop {
        write!(out, "You: ")?;
        out.flush()?;

        line.clear();
        let read = tokio::select! {
            read = input.read_line(&mut line) => read?,
            _ = &mut shutdown => return interrupted(out),
        };
        if read == 0 {
            writeln!(out, "\n\n👋 Goodbye!")?;
            return Ok(ReplExit::EndOfInput);
        }

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => {
                writeln!(out, "\n👋 Thank you for chatting. Take care!")?;
                return Ok(ReplExit::Quit);
            }
            Command::Clear => {
                history.clear();
                writeln!(out, "\n🔄 Conversation history cleared.\n")?;
            }
            Command::History => {
                if history.is_empty() {
                    writeln!(out, "\n📭 No conversation history yet.\n")?;
                } else {
                    writeln!(out, "\n📜 Conversation History:")?;
                    writeln!(out, "{}", "-".repeat(80))?;
                    for entry in history.render() {
                        writeln!(out, "{}", entry)?;
                    }
                    writeln!(out, "{}\n", "-".repeat(80))?;
                }
            }
            Command::Message(message) => {
                write!(out, "\n🤔 Thinking...")?;
                out.flush()?;
                let result = tokio::select! {
                    result = backend.reply(&message, history.turns()) => result,
                    _ = &mut shutdown => return interrupted(out),
                };
                write!(out, "\r{}\r", " ".repeat(20))?;

                match result {
                    Ok(reply) => {
                        writeln!(out, "AI: {}\n", reply)?;
                        history.push_exchange(&message, &reply);
                    }
                    Err(e) => writeln!(out, "\n❌ Error: {}\n", e)?,
                }
            }
        }
    }
}

fn interrupted<W: Write>(out: &mut W) -> io::Result<ReplExit> {
    writeln!(out, "\n\n👋 Chat interrupted. Goodbye!")?;
    out.flush()?;
    Ok(ReplExit::Interrupted)
}
