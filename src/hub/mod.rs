//! Model hub upload
//!
//! Uploads a local model folder file by file, each with its own retry
//! budget, so one flaky transfer does not restart the whole folder.

pub mod client;
pub mod error;
pub mod retry;
pub mod upload;

pub use client::{HubClient, UploadMode};
pub use error::HubError;
pub use retry::RetryPolicy;
pub use upload::{collect_files, upload_folder, UploadReport};
