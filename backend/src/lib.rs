//! Resilio Backend Library
//!
//! The account and chat-history API, and the inference endpoint it calls for
//! replies. Both binaries (`src/main.rs` and `src/bin/inference_server.rs`)
//! are thin wrappers over the modules exposed here.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod middleware;
/// Application state management
///
/// Holds the stores and the reply generator shared by request handlers.
pub mod state;

pub use api::router as build_router;
