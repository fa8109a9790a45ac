//! Error types for wordrill-core

use thiserror::Error;

/// Result type alias using wordrill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wordrill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sync record not found
    #[error("Sync record not found: {0}")]
    NotFound(i64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
