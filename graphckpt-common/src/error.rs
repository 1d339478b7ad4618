//! Common error types for graphckpt

use thiserror::Error;

/// Common result type for graphckpt operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across graphckpt backends
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Stored value carries a type tag the serializer cannot read
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    /// Stored row could not be turned back into a checkpoint or item
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Configuration or connection string error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
