//! Storage error types for bassline-storage.

use thiserror::Error;

use bassline_core::CoreError;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// No network with the given ID is stored.
    #[error("network not found: {0}")]
    NetworkNotFound(String),

    /// Stored records could not be composed into a consistent network.
    #[error("reconstruction error: {reason}")]
    Reconstruction { reason: String },

    /// The backend is unavailable (e.g. closed or failing).
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        StorageError::Reconstruction {
            reason: err.to_string(),
        }
    }
}
