//! Error types for protocol operations.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol types.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A remote document does not have the shape of a health record.
    #[error("invalid document {id:?}: {reason}")]
    InvalidDocument {
        /// Document ID.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A conflict policy name was not recognized.
    #[error("unknown conflict policy {0:?} (expected server-wins, client-wins or latest-wins)")]
    UnknownPolicy(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid document error.
    pub fn invalid_document(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
