//! Error types for schema synchronization.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while talking to the schema service or the descriptor folder.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The service answered with a failure status.
    #[error("{method} {url} failed with status {status}: {body}")]
    Remote {
        method: reqwest::Method,
        url: String,
        status: u16,
        body: String,
    },

    /// The connection exposes no schema at all.
    #[error("connection {connection_id} has no schemas")]
    SchemaNotFound { connection_id: String },

    /// Missing or unusable settings (credentials, base URL, timeout).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A descriptor file could not be read or parsed.
    #[error("invalid descriptor {}: {message}", path.display())]
    Validation { path: PathBuf, message: String },

    /// The request never produced a response (connect, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(path: &Path, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
