//! Error types for tidewatch-core

use thiserror::Error;

/// Result type alias using tidewatch-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in local tidewatch-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Favorite not found
    #[error("Favorite not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
