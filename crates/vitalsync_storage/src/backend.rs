//! Key-value store trait definition.

use crate::error::{StorageError, StorageResult};

/// A synchronous key → string persistence surface.
///
/// Stores are **opaque**: the engine serializes whole collections to JSON
/// and hands the text over; the store never parses it.
///
/// # Invariants
///
/// - `get` returns exactly the last value passed to `set` for that key
/// - `set` replaces the whole value atomically from a reader's point of view
/// - `remove` of a missing key is not an error
/// - Stores must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key is invalid for this store
    /// - The write would exceed the store's capacity
    /// - An I/O error occurs
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Checks that a key only uses characters every store can represent.
///
/// Keys are limited to ASCII alphanumerics, `_`, `-` and `.`, must be
/// non-empty and must not start with a dot.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] when the key is rejected.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_keys() {
        assert!(validate_key("vitalsync_records").is_ok());
        assert!(validate_key("status-v1.json").is_ok());
    }

    #[test]
    fn rejects_path_like_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("with space").is_err());
    }
}
