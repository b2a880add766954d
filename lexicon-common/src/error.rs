//! Common error types for the terminology engine

use thiserror::Error;

/// Common result type for terminology operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the engine and its repositories
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Terminology key with an empty path segment
    #[error("Invalid terminology key: '{0}'")]
    InvalidKey(String),

    /// A key is used both as a leaf and as the parent of another key
    #[error("Structural conflict: '{leaf}' is a leaf but '{nested}' nests below it")]
    StructuralConflict { leaf: String, nested: String },

    /// Repository backend failure not covered by a more specific variant
    #[error("Repository error: {0}")]
    Repository(String),
}
