//! Hub upload errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to the model hub
#[derive(Error, Debug)]
pub enum HubError {
    /// Transport failure (connection, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with an error status
    #[error("{operation} returned {status}: {body}")]
    Status {
        /// Which call failed
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnosis
        body: String,
    },

    /// The hub answered 2xx with something we did not expect
    #[error("Unexpected hub response: {0}")]
    Protocol(String),

    /// Reading the local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The folder to upload does not exist
    #[error("Folder not found: {}", .0.display())]
    MissingFolder(PathBuf),
}
