//! Error types for the sync engine.

use thiserror::Error;
use vitalsync_protocol::ProtocolError;
use vitalsync_storage::StorageError;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while caching, syncing, importing or exporting.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote store could not be reached or refused the call.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A record or document did not fit the schema.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Imported data is not a JSON array of records.
    #[error("invalid import format: {0}")]
    InvalidFormat(String),

    /// A record failed range validation.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// CSV export failed.
    #[error("export error: {0}")]
    Export(String),

    /// A record with this ID is already cached.
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    /// The requested backup does not exist.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// The operation needs connectivity.
    #[error("not connected to remote store")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("permission denied").is_retryable());
        assert!(!SyncError::NotConnected.is_retryable());
        assert!(!SyncError::InvalidFormat("not an array".into()).is_retryable());
        assert!(!SyncError::Storage(StorageError::QuotaExceeded {
            key: "records".into(),
            requested: 10,
            capacity: 5,
        })
        .is_retryable());
    }

    #[test]
    fn validation_lists_every_violation() {
        let err = SyncError::Validation(vec![
            "weight out of range".into(),
            "sleepHours out of range".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: weight out of range; sleepHours out of range"
        );
    }
}
