//! Sync status.

use crate::conflict::ConflictPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connectivity and sync posture of an engine.
///
/// Persisted after every mutation as a camelCase JSON object so that it
/// survives restarts. Missing fields fall back to their defaults when a
/// status written by an older version is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStatus {
    /// Mirrors the connectivity signal.
    pub is_online: bool,
    /// Last successful reconciliation with the remote store.
    #[serde(with = "crate::timestamp::optional")]
    pub last_sync: Option<DateTime<Utc>>,
    /// True iff at least one local record is unsynced.
    pub has_pending_changes: bool,
    /// Policy applied when the same record exists on both sides.
    pub conflict_resolution: ConflictPolicy,
}

impl SyncStatus {
    /// Creates a status for a fresh installation.
    pub fn new(is_online: bool, conflict_resolution: ConflictPolicy) -> Self {
        Self {
            is_online,
            last_sync: None,
            has_pending_changes: false,
            conflict_resolution,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new(false, ConflictPolicy::default())
    }
}
