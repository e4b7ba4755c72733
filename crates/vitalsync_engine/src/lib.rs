//! # VitalSync Engine
//!
//! Offline-first synchronization of health records between a local
//! key-value cache and a remote document store.
//!
//! This crate provides:
//! - The local record cache and persisted sync status
//! - Upload and download passes, and a live remote feed
//! - Policy-driven reconciliation of local and remote records
//! - JSON/CSV export, JSON import, and remote backups
//! - The [`RemoteStore`] seam, with an in-memory implementation for tests
//!
//! ## Model
//!
//! Local writes always land in the cache first and are flagged unsynced.
//! The remote store is eventually consistent with the union of all
//! devices' uploads; each device's cache is eventually consistent with the
//! remote under the chosen [`ConflictPolicy`](vitalsync_protocol::ConflictPolicy).
//!
//! ## Key Invariants
//!
//! - `has_pending_changes` is true iff a cached record is unsynced
//! - A record is flagged synced only after the remote store accepted it
//! - A failed pass leaves the cache as it was
//! - Local-only records are never dropped by a merge
//! - The engine never retries on its own

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod connectivity;
mod engine;
mod error;
pub mod export;
mod remote;
mod status;
mod subscription;

pub use cache::{new_record_id, LocalCache};
pub use config::{
    EngineConfig, RetryConfig, DEFAULT_BACKUP_COLLECTION, DEFAULT_COLLECTION, DEFAULT_FEED_LIMIT,
    DEFAULT_RECORDS_KEY, DEFAULT_STATUS_KEY,
};
pub use connectivity::ConnectivityMonitor;
pub use engine::{SyncEngine, SyncStats, UploadReport};
pub use error::{SyncError, SyncResult};
pub use remote::{sort_recent_first, MemoryRemoteStore, RemoteStore, SnapshotListener};
pub use status::StatusTracker;
pub use subscription::Subscription;
