//! Error types for tmx-core

use thiserror::Error;

/// Result type alias using tmx-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tmx-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Document store error
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Document already exists
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The acting user lacks the required role
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
