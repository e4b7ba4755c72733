//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Writing the value would exceed the store's capacity.
    #[error("quota exceeded writing {key:?}: {requested} bytes requested, capacity {capacity}")]
    QuotaExceeded {
        /// The key being written.
        key: String,
        /// Total bytes the store would hold after the write.
        requested: usize,
        /// The configured capacity in bytes.
        capacity: usize,
    },

    /// The key contains characters the store cannot represent.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Another process holds the store's directory lock.
    #[error("storage directory is locked by another process")]
    Locked,

    /// A stored value is not valid UTF-8.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}
