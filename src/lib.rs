//! Resilio CLI library
//!
//! Everything behind the `resilio` subcommands. `src/main.rs` only parses
//! arguments and prints outcomes.

pub mod archive;
pub mod chat;
pub mod hub;
pub mod merge;
