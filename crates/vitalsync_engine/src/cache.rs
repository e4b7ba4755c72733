//! Local record cache.

use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;
use vitalsync_protocol::HealthRecord;
use vitalsync_storage::KeyValueStore;

/// Generates an ID for a record created on this device.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// The full record set, persisted as one JSON array under a single key.
///
/// Reads never fail: a missing, unreadable or non-array blob reads as an
/// empty set, and entries that do not decode are skipped. Every write
/// replaces the whole blob. The cache does no locking of its own; the
/// engine serializes read-modify-write sequences.
pub struct LocalCache<S> {
    store: Arc<S>,
    key: String,
}

impl<S: KeyValueStore> LocalCache<S> {
    /// Creates a cache over `store` at `key`.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns every decodable cached record in stored order.
    pub fn get_all(&self) -> Vec<HealthRecord> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read record cache");
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!(key = %self.key, "record cache is not an array, treating as empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "record cache is corrupt, treating as empty");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    error!(
                        key = %self.key,
                        index,
                        error = %e,
                        entry = %entry,
                        "undecodable cached record will be dropped on the next write"
                    );
                    None
                }
            })
            .collect()
    }

    /// Returns the records awaiting upload.
    pub fn pending(&self) -> Vec<HealthRecord> {
        self.get_all()
            .into_iter()
            .filter(HealthRecord::is_pending)
            .collect()
    }

    /// Returns true if any record awaits upload.
    pub fn has_pending(&self) -> bool {
        self.get_all().iter().any(HealthRecord::is_pending)
    }

    /// Appends one record, assigning an ID if it has none.
    ///
    /// Returns the record as stored.
    pub fn append(&self, record: HealthRecord) -> SyncResult<HealthRecord> {
        let mut stored = self.append_all(vec![record])?;
        Ok(stored.remove(0))
    }

    /// Appends records in one write, assigning IDs where missing.
    ///
    /// # Errors
    ///
    /// [`SyncError::DuplicateId`] if a supplied ID is already cached or
    /// appears twice in `records`. Nothing is written in that case.
    pub fn append_all(&self, records: Vec<HealthRecord>) -> SyncResult<Vec<HealthRecord>> {
        let mut all = self.get_all();
        let mut ids: HashSet<String> = all.iter().map(|r| r.id.clone()).collect();

        let mut added = Vec::with_capacity(records.len());
        for mut record in records {
            if record.needs_id() {
                record.id = new_record_id();
            }
            if !ids.insert(record.id.clone()) {
                return Err(SyncError::DuplicateId(record.id));
            }
            added.push(record);
        }

        all.extend(added.iter().cloned());
        self.replace_all(&all)?;

        debug!(added = added.len(), total = all.len(), "appended to record cache");
        Ok(added)
    }

    /// Replaces the whole record set.
    pub fn replace_all(&self, records: &[HealthRecord]) -> SyncResult<()> {
        let blob = serde_json::to_string(records)?;
        self.store.set(&self.key, &blob)?;
        Ok(())
    }

    /// Applies `mutate` to the current set and persists the result.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut Vec<HealthRecord>) -> R) -> SyncResult<R> {
        let mut records = self.get_all();
        let result = mutate(&mut records);
        self.replace_all(&records)?;
        Ok(result)
    }
}
