//! LoRA adapter merge
//!
//! Folds a low-rank adapter into a base model's weights and writes the
//! result as a standalone safetensors model. Everything runs on the CPU,
//! one shard at a time.

pub mod adapter;
pub mod model;

pub use adapter::{merge_weight, AdapterConfig, LoraAdapter};
pub use model::{merge_model, resolve_base, MergeReport};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while merging
#[derive(Debug, Error)]
pub enum MergeError {
    /// A required file or directory is absent
    #[error("Not found: {}", .0.display())]
    MissingPath(PathBuf),

    /// The base model has no safetensors shards
    #[error("No safetensors shards in {}", .0.display())]
    NoShards(PathBuf),

    /// The adapter does not fit the base model
    #[error("Incompatible adapter: {0}")]
    IncompatibleAdapter(String),

    /// The adapter delta and the base weight disagree on shape
    #[error("Shape mismatch for {name}: weight {weight:?}, adapter delta {delta:?}")]
    ShapeMismatch {
        /// Base weight name
        name: String,
        /// Base weight shape
        weight: Vec<usize>,
        /// Shape the adapter would produce
        delta: Vec<usize>,
    },

    /// Reading or writing files failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON config file is malformed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Tensor load, arithmetic or save failed
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Downloading the base model failed
    #[error("Hub download failed: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),
}
