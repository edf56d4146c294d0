//! Error types for the data store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQL statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transcript not found: {0}")]
    TranscriptNotFound(String),

    /// The transcript already references an order; the link is write-once.
    #[error("transcript {0} is already linked to an order")]
    TranscriptAlreadyLinked(String),

    /// A stored value could not be mapped back into a domain type.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
