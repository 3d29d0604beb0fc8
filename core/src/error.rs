//! Error types for the permission store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;


/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing document could not be read or written.
    #[error("I/O failure for '{target}': {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing document could not be encoded or decoded.
    #[error("serialization error in {path}: {message}")]
    Serialization { path: PathBuf, message: String },

    /// A node in the document tree has the wrong shape.
    #[error("malformed document at '{path}': expected {expected}")]
    MalformedDocument { path: String, expected: &'static str },

    /// An option key that names no single option.
    #[error("invalid option key '{0}': must not be blank")]
    InvalidKey(String),

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn malformed(path: impl Into<String>, expected: &'static str) -> Self {
        StoreError::MalformedDocument {
            path: path.into(),
            expected,
        }
    }

    /// True for failures of the persistence collaborator, which never roll
    /// back an in-memory mutation.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, StoreError::Io { .. } | StoreError::Serialization { .. })
    }
}
