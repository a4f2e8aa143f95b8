//! Error types for versioning operations

use crate::storage::db::DatabaseError;
use thiserror::Error;

/// Result type for versioning operations
pub type VersioningResult<T> = Result<T, VersioningError>;

/// Errors that can occur during versioning operations
#[derive(Debug, Error)]
pub enum VersioningError {
    /// Storage substrate failure (open, migration, query)
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A stored value could not be read back or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No version carries the requested label
    #[error("Version not found: {label}")]
    NotFound { label: String },

    /// Import document is malformed
    #[error("Invalid import data: {0}")]
    InvalidImport(String),

    /// Configuration value rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Auto-backup scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<rusqlite::Error> for VersioningError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

impl VersioningError {
    /// Create a not-found error for a version label
    pub fn not_found(label: impl Into<String>) -> Self {
        Self::NotFound {
            label: label.into(),
        }
    }
}
