//! Error types for tagnet-store.

use std::path::PathBuf;

use tagnet_types::RecordKind;

/// Result type for tagnet-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tagnet-store.
///
/// No operation retries internally; every failure carries enough context
/// (operation, key, underlying cause) for a higher layer to log or retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted before opening the store or after closing it.
    #[error("Store is not connected")]
    NotConnected,

    /// A row insert or its metadata update failed.
    #[error("Failed to store {kind} record for {key}: {source}")]
    Write {
        kind: RecordKind,
        key: String,
        source: rusqlite::Error,
    },

    /// The operation requires a table for this key, and none exists.
    #[error("No table for key: {0}")]
    TableNotFound(String),

    /// Export destination could not be written.
    #[error("Failed to write export to {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create the database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
