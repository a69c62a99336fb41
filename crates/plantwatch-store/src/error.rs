//! Error types for plantwatch-store.

use std::path::PathBuf;

/// Result type for plantwatch-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plantwatch-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error from the MySQL target.
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}
