//! The sync engine.

use crate::cache::LocalCache;
use crate::config::EngineConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::export;
use crate::remote::{RemoteStore, SnapshotListener};
use crate::status::StatusTracker;
use crate::subscription::Subscription;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vitalsync_protocol::{
    decode_documents, reconcile, timestamp, validate_record, Backup, ConflictPolicy, HealthRecord,
    RemoteDocument, SyncStatus,
};
use vitalsync_storage::KeyValueStore;

/// Result of an upload pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadReport {
    /// Records accepted by the remote store.
    pub uploaded: usize,
    /// True if the pass did not run because the engine is offline.
    pub skipped: bool,
}

impl UploadReport {
    fn skipped() -> Self {
        Self {
            uploaded: 0,
            skipped: true,
        }
    }
}

/// Running totals across the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed upload passes.
    pub uploads_completed: u64,
    /// Completed download passes.
    pub downloads_completed: u64,
    /// Records accepted by the remote store.
    pub records_uploaded: u64,
    /// Remote snapshots merged, from download passes and live feeds.
    pub snapshots_merged: u64,
    /// Remote documents rejected as malformed.
    pub documents_rejected: u64,
    /// Conflicts resolved in favour of the remote version.
    pub remote_wins: u64,
    /// Conflicts resolved in favour of the local version.
    pub local_wins: u64,
    /// Retries performed by [`SyncEngine::sync_to_cloud_with_retry`].
    pub retries: u64,
    /// Last error message, if the most recent pass failed.
    pub last_error: Option<String>,
}

/// Pieces shared between the engine and its live feed listeners.
struct Shared<S> {
    cache: LocalCache<S>,
    status: StatusTracker<S>,
    stats: RwLock<SyncStats>,
    /// Serializes every cache read-modify-write section. Re-entrant so a
    /// remote store may deliver feed snapshots from inside an upsert.
    pass_lock: ReentrantMutex<()>,
}

impl<S: KeyValueStore> Shared<S> {
    /// Decodes a remote snapshot, merges it into the cache and persists the
    /// result. Caller must hold the pass lock.
    fn merge_snapshot(&self, documents: &[RemoteDocument]) -> SyncResult<Vec<HealthRecord>> {
        let (remote, rejected) = decode_documents(documents);
        for error in &rejected {
            warn!(error = %error, "skipping malformed remote document");
        }

        let policy = self.status.current().conflict_resolution;
        let local = self.cache.get_all();
        let outcome = reconcile(&local, &remote, policy);
        self.cache.replace_all(&outcome.records)?;

        let remote_wins = outcome.remote_wins();
        let local_wins = outcome.conflicts.len() - remote_wins;
        debug!(
            policy = %policy,
            local = local.len(),
            remote = remote.len(),
            inserted = outcome.inserted,
            remote_wins,
            local_wins,
            "merged remote snapshot"
        );

        {
            let mut stats = self.stats.write();
            stats.snapshots_merged += 1;
            stats.documents_rejected += rejected.len() as u64;
            stats.remote_wins += remote_wins as u64;
            stats.local_wins += local_wins as u64;
        }

        Ok(outcome.records)
    }

    fn record_error(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
    }
}

/// Offline-first sync engine for health records.
///
/// Owns the local cache and the persisted [`SyncStatus`], and reconciles
/// them with a [`RemoteStore`]:
///
/// - local writes land in the cache first, flagged unsynced
/// - an upload pass pushes every unsynced record, then flips them synced
/// - a download pass, or a live feed, merges remote records into the cache
///   under the current [`ConflictPolicy`]
///
/// Every cache read-modify-write section runs under one pass lock, so
/// overlapping passes from different threads cannot lose updates.
///
/// # Lifecycle
///
/// [`new`](Self::new) loads the persisted status. [`start`](Self::start)
/// binds the connectivity signal and uploads if online.
/// [`shutdown`](Self::shutdown) unbinds it again.
pub struct SyncEngine<S: KeyValueStore, R: RemoteStore> {
    config: EngineConfig,
    shared: Arc<Shared<S>>,
    remote: Arc<R>,
    connectivity: Arc<ConnectivityMonitor>,
    connectivity_subscription: Mutex<Option<Subscription>>,
}

impl<S, R> SyncEngine<S, R>
where
    S: KeyValueStore + 'static,
    R: RemoteStore + 'static,
{
    /// Creates an engine, loading the persisted status from `store`.
    ///
    /// `is_online` is taken from `connectivity`, never from the persisted
    /// status, and `has_pending_changes` is recomputed from the cache.
    pub fn new(
        config: EngineConfig,
        store: Arc<S>,
        remote: Arc<R>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        let cache = LocalCache::new(Arc::clone(&store), config.records_key.clone());
        let status = StatusTracker::load(store, config.status_key.clone(), config.default_policy);

        let is_online = connectivity.is_online();
        let has_pending = cache.has_pending();
        status.update(|s| {
            s.is_online = is_online;
            s.has_pending_changes = has_pending;
        });

        Self {
            config,
            shared: Arc::new(Shared {
                cache,
                status,
                stats: RwLock::new(SyncStats::default()),
                pass_lock: ReentrantMutex::new(()),
            }),
            remote,
            connectivity,
            connectivity_subscription: Mutex::new(None),
        }
    }

    /// Binds the connectivity signal and runs an upload pass if online.
    ///
    /// Calling `start` again rebinds. Upload failures here are logged, not
    /// returned.
    pub fn start(self: &Arc<Self>) {
        let engine = Arc::downgrade(self);
        let subscription = self.connectivity.subscribe(move |online| {
            if let Some(engine) = engine.upgrade() {
                engine.handle_connectivity(online);
            }
        });
        *self.connectivity_subscription.lock() = Some(subscription);

        let online = self.connectivity.is_online();
        self.shared.status.update(|s| s.is_online = online);
        info!(online, "sync engine started");

        if online {
            self.background_upload("startup");
        }
    }

    /// Unbinds the connectivity signal. In-flight passes are not cancelled.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.connectivity_subscription.lock().take() {
            subscription.unsubscribe();
            info!("sync engine stopped");
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the connectivity monitor.
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// Returns the remote store.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Returns a copy of the running totals.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Returns a copy of the current status.
    pub fn sync_status(&self) -> SyncStatus {
        self.shared.status.current()
    }

    /// Registers a status listener, immediately called with the current status.
    ///
    /// Deliveries follow update order across threads. Listeners run on the
    /// updating thread and must not start sync passes themselves.
    pub fn on_sync_status_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.shared.status.subscribe(listener)
    }

    /// Changes the conflict policy used by subsequent merges.
    pub fn set_conflict_resolution(&self, policy: ConflictPolicy) {
        self.shared.status.update(|s| s.conflict_resolution = policy);
        info!(policy = %policy, "conflict resolution changed");
    }

    /// Returns every cached record.
    pub fn get_local_data(&self) -> Vec<HealthRecord> {
        self.shared.cache.get_all()
    }

    /// Validates and caches a record, then uploads if online and auto-sync
    /// is enabled.
    ///
    /// The record is stored unsynced with a fresh `last_modified`, and gets
    /// an ID if it has none.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if a measurement is out of range; nothing
    ///   is stored.
    /// - [`SyncError::DuplicateId`] if the record carries an ID that is
    ///   already cached; nothing is stored.
    /// - [`SyncError::Storage`] if the cache cannot be written.
    /// - Any upload error. The record stays cached and pending.
    pub fn save_local(&self, record: HealthRecord) -> SyncResult<HealthRecord> {
        let violations = validate_record(&record);
        if !violations.is_empty() {
            return Err(SyncError::Validation(violations));
        }

        let stored = {
            let _pass = self.shared.pass_lock.lock();
            let mut record = record;
            record.synced = false;
            record.touch(timestamp::now());

            let stored = self.shared.cache.append(record)?;
            self.shared.status.update(|s| s.has_pending_changes = true);
            stored
        };
        debug!(id = %stored.id, date = %stored.date, "saved record locally");

        if self.should_auto_sync() {
            self.sync_to_cloud()?;
        }
        Ok(stored)
    }

    /// Uploads every pending record.
    ///
    /// Offline, this returns a skipped report without touching anything.
    /// Records are flipped to synced only after every upsert succeeded; on
    /// failure the cache is left as it was and the error is returned.
    pub fn sync_to_cloud(&self) -> SyncResult<UploadReport> {
        if !self.is_online() {
            debug!("offline, skipping upload pass");
            return Ok(UploadReport::skipped());
        }

        let _pass = self.shared.pass_lock.lock();
        let pending = self.shared.cache.pending();
        if pending.is_empty() {
            debug!("nothing to upload");
        }

        let mut acknowledged = HashMap::with_capacity(pending.len());
        for record in pending {
            let mut outgoing = record;
            outgoing.synced = true;
            let document = outgoing.to_document()?;

            match self.remote.upsert(&self.config.collection, document) {
                Ok(server_time) => {
                    acknowledged.insert(outgoing.id, server_time);
                }
                Err(e) => {
                    warn!(id = %outgoing.id, error = %e, "upload pass aborted");
                    self.shared.record_error(&e);
                    return Err(e);
                }
            }
        }

        let still_pending = self.shared.cache.update(|records| {
            for record in records.iter_mut() {
                if let Some(server_time) = acknowledged.get(&record.id) {
                    record.mark_synced(*server_time);
                }
            }
            records.iter().any(HealthRecord::is_pending)
        })?;

        let now = timestamp::now();
        self.shared.status.update(|s| {
            s.last_sync = Some(now);
            s.has_pending_changes = still_pending;
        });

        {
            let mut stats = self.shared.stats.write();
            stats.uploads_completed += 1;
            stats.records_uploaded += acknowledged.len() as u64;
            stats.last_error = None;
        }

        info!(uploaded = acknowledged.len(), "upload pass complete");
        Ok(UploadReport {
            uploaded: acknowledged.len(),
            skipped: false,
        })
    }

    /// Runs [`sync_to_cloud`](Self::sync_to_cloud), retrying retryable errors
    /// with the configured backoff.
    pub fn sync_to_cloud_with_retry(&self) -> SyncResult<UploadReport> {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.shared.stats.write().retries += 1;
            }

            match self.sync_to_cloud() {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    debug!(attempt, error = %e, "upload failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Downloads the most recent remote records and merges them into the
    /// cache under the current policy.
    ///
    /// Offline, returns the cache unchanged. Malformed remote documents are
    /// skipped.
    pub fn sync_from_cloud(&self) -> SyncResult<Vec<HealthRecord>> {
        if !self.is_online() {
            debug!("offline, returning cached records");
            return Ok(self.shared.cache.get_all());
        }

        let _pass = self.shared.pass_lock.lock();
        let documents = self
            .remote
            .query_recent(&self.config.collection, self.config.feed_limit)
            .inspect_err(|e| self.shared.record_error(e))?;

        let merged = self.shared.merge_snapshot(&documents)?;
        let has_pending = merged.iter().any(HealthRecord::is_pending);
        let now = timestamp::now();
        self.shared.status.update(|s| {
            s.last_sync = Some(now);
            s.has_pending_changes = has_pending;
        });

        {
            let mut stats = self.shared.stats.write();
            stats.downloads_completed += 1;
            stats.last_error = None;
        }

        info!(documents = documents.len(), records = merged.len(), "download pass complete");
        Ok(merged)
    }

    /// Subscribes to the remote feed.
    ///
    /// Each snapshot is merged into the cache and the merged set is passed
    /// to `callback`, until the returned handle is released. Offline, the
    /// cached records are delivered once and an inert handle is returned.
    pub fn subscribe_to_cloud_updates<F>(&self, callback: F) -> SyncResult<Subscription>
    where
        F: Fn(&[HealthRecord]) + Send + Sync + 'static,
    {
        if !self.is_online() {
            callback(&self.shared.cache.get_all());
            return Ok(Subscription::inert());
        }

        let shared = Arc::clone(&self.shared);
        let listener: SnapshotListener = Arc::new(move |documents: &[RemoteDocument]| {
            let merged = {
                let _pass = shared.pass_lock.lock();
                match shared.merge_snapshot(documents) {
                    Ok(merged) => {
                        let has_pending = merged.iter().any(HealthRecord::is_pending);
                        if shared.status.current().has_pending_changes != has_pending {
                            shared.status.update(|s| s.has_pending_changes = has_pending);
                        }
                        merged
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to apply remote snapshot");
                        shared.record_error(&e);
                        return;
                    }
                }
            };
            callback(&merged);
        });

        let subscription =
            self.remote
                .watch(&self.config.collection, self.config.feed_limit, listener)?;
        info!(collection = %self.config.collection, "subscribed to remote feed");
        Ok(subscription)
    }

    /// Returns the cache as a pretty-printed JSON array.
    pub fn export_data(&self) -> SyncResult<String> {
        export::records_to_json(&self.shared.cache.get_all())
    }

    /// Returns the cache as CSV.
    pub fn export_csv(&self) -> SyncResult<String> {
        export::records_to_csv(&self.shared.cache.get_all())
    }

    /// Imports records from a JSON export, returning how many were added.
    ///
    /// Every entry gets a fresh ID and is stored unsynced; existing records
    /// are never touched. The payload is rejected as a whole, before any
    /// write, if any entry is malformed.
    pub fn import_data(&self, text: &str) -> SyncResult<usize> {
        let records = export::parse_import(text)?;
        let count = records.len();

        {
            let _pass = self.shared.pass_lock.lock();
            let batch = timestamp::now().timestamp_millis();
            let imported: Vec<HealthRecord> = records
                .into_iter()
                .map(|mut record| {
                    record.id = format!(
                        "{}_{}_{}",
                        self.config.import_id_prefix,
                        batch,
                        Uuid::new_v4().simple()
                    );
                    record.synced = false;
                    record
                })
                .collect();

            self.shared.cache.append_all(imported)?;
            let has_pending = self.shared.cache.has_pending();
            self.shared.status.update(|s| s.has_pending_changes = has_pending);
        }
        info!(count, "imported records");

        if count > 0 && self.should_auto_sync() {
            self.sync_to_cloud()?;
        }
        Ok(count)
    }

    /// Stores the whole cache as a remote backup and returns its ID.
    pub fn create_backup(&self) -> SyncResult<String> {
        if !self.is_online() {
            return Err(SyncError::NotConnected);
        }

        let id = format!("backup_{}", timestamp::now().timestamp_millis());
        let records = self.shared.cache.get_all();
        let count = records.len();
        self.remote
            .put_backup(&self.config.backup_collection, Backup::new(id.clone(), records))?;

        info!(id = %id, records = count, "backup created");
        Ok(id)
    }

    /// Replaces the cache with the records of a remote backup, returning how
    /// many were restored.
    pub fn restore_from_backup(&self, id: &str) -> SyncResult<usize> {
        if !self.is_online() {
            return Err(SyncError::NotConnected);
        }

        let backup = self
            .remote
            .get_backup(&self.config.backup_collection, id)?
            .ok_or_else(|| SyncError::BackupNotFound(id.to_string()))?;

        let _pass = self.shared.pass_lock.lock();
        self.shared.cache.replace_all(&backup.records)?;
        let has_pending = backup.records.iter().any(HealthRecord::is_pending);
        let now = timestamp::now();
        self.shared.status.update(|s| {
            s.last_sync = Some(now);
            s.has_pending_changes = has_pending;
        });

        info!(id = %id, records = backup.records.len(), "backup restored");
        Ok(backup.records.len())
    }

    fn is_online(&self) -> bool {
        self.shared.status.current().is_online
    }

    fn should_auto_sync(&self) -> bool {
        self.config.auto_sync && self.is_online()
    }

    fn handle_connectivity(&self, online: bool) {
        self.shared.status.update(|s| s.is_online = online);
        if online {
            self.background_upload("reconnect");
        }
    }

    fn background_upload(&self, trigger: &'static str) {
        if !self.config.auto_sync {
            return;
        }
        if let Err(e) = self.sync_to_cloud() {
            warn!(trigger, error = %e, "background upload failed");
        }
    }
}
