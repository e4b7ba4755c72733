//! Remote document store abstraction.

use crate::error::{SyncError, SyncResult};
use crate::subscription::Subscription;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use vitalsync_protocol::{timestamp, Backup, RemoteDocument};

/// Callback receiving every snapshot of a watched collection.
pub type SnapshotListener = Arc<dyn Fn(&[RemoteDocument]) + Send + Sync>;

/// A remote document store.
///
/// Collections hold JSON documents keyed by ID. The store owns the clock:
/// every write is stamped with a server-assigned `lastModified`, which
/// `upsert` returns.
pub trait RemoteStore: Send + Sync {
    /// Creates or fully replaces a document, returning the server timestamp.
    fn upsert(&self, collection: &str, document: RemoteDocument) -> SyncResult<DateTime<Utc>>;

    /// Returns up to `limit` documents, most recently modified first.
    fn query_recent(&self, collection: &str, limit: usize) -> SyncResult<Vec<RemoteDocument>>;

    /// Delivers the current snapshot (same ordering and cap as
    /// [`query_recent`](RemoteStore::query_recent)) to `listener`, then again
    /// after every change, until the returned handle is released.
    fn watch(
        &self,
        collection: &str,
        limit: usize,
        listener: SnapshotListener,
    ) -> SyncResult<Subscription>;

    /// Stores a backup, returning the server timestamp.
    fn put_backup(&self, collection: &str, backup: Backup) -> SyncResult<DateTime<Utc>>;

    /// Fetches a backup by ID.
    fn get_backup(&self, collection: &str, id: &str) -> SyncResult<Option<Backup>>;
}

impl<R: RemoteStore + ?Sized> RemoteStore for Arc<R> {
    fn upsert(&self, collection: &str, document: RemoteDocument) -> SyncResult<DateTime<Utc>> {
        (**self).upsert(collection, document)
    }

    fn query_recent(&self, collection: &str, limit: usize) -> SyncResult<Vec<RemoteDocument>> {
        (**self).query_recent(collection, limit)
    }

    fn watch(
        &self,
        collection: &str,
        limit: usize,
        listener: SnapshotListener,
    ) -> SyncResult<Subscription> {
        (**self).watch(collection, limit, listener)
    }

    fn put_backup(&self, collection: &str, backup: Backup) -> SyncResult<DateTime<Utc>> {
        (**self).put_backup(collection, backup)
    }

    fn get_backup(&self, collection: &str, id: &str) -> SyncResult<Option<Backup>> {
        (**self).get_backup(collection, id)
    }
}

/// Orders documents most recently modified first; ties and untimestamped
/// documents fall back to ID order.
pub fn sort_recent_first(documents: &mut [RemoteDocument]) {
    documents.sort_by(|a, b| {
        b.last_modified()
            .cmp(&a.last_modified())
            .then_with(|| a.id.cmp(&b.id))
    });
}

struct Watcher {
    id: u64,
    collection: String,
    limit: usize,
    listener: SnapshotListener,
}

/// An in-memory remote store for testing.
///
/// Supports connectivity toggling, upsert failure injection, call
/// counters, and writes that bypass the engine to simulate other devices.
/// Watchers are notified synchronously from inside the writing call.
#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<HashMap<String, BTreeMap<String, RemoteDocument>>>,
    backups: RwLock<HashMap<String, BTreeMap<String, Backup>>>,
    watchers: Arc<RwLock<Vec<Watcher>>>,
    next_watcher: AtomicU64,
    disconnected: AtomicBool,
    upsert_budget: Mutex<Option<usize>>,
    upserts: AtomicUsize,
    queries: AtomicUsize,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryRemoteStore {
    /// Creates an empty, connected store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether calls succeed or fail with [`SyncError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Lets `successes` more upserts through, then fails every upsert with a
    /// retryable transport error until [`clear_failures`] is called.
    ///
    /// [`clear_failures`]: MemoryRemoteStore::clear_failures
    pub fn fail_upserts_after(&self, successes: usize) {
        *self.upsert_budget.lock() = Some(successes);
    }

    /// Removes any injected failure.
    pub fn clear_failures(&self) {
        *self.upsert_budget.lock() = None;
    }

    /// Number of successful upserts.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Number of `query_recent` calls.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Returns a stored document.
    pub fn document(&self, collection: &str, id: &str) -> Option<RemoteDocument> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Returns every document in a collection, in ID order.
    pub fn documents(&self, collection: &str) -> Vec<RemoteDocument> {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Stores a document exactly as given and notifies watchers, as if
    /// another device had written it.
    pub fn insert_raw(&self, collection: &str, document: RemoteDocument) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document);
        self.notify(collection);
    }

    fn check_connected(&self) -> SyncResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(SyncError::NotConnected)
        } else {
            Ok(())
        }
    }

    fn consume_budget(&self) -> SyncResult<()> {
        let mut budget = self.upsert_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(SyncError::transport_retryable("injected upsert failure")),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Server clock, strictly increasing across calls.
    fn server_now(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock();
        let now = timestamp::now();
        let stamp = match *last {
            Some(previous) if previous >= now => previous + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    fn snapshot(&self, collection: &str, limit: usize) -> Vec<RemoteDocument> {
        let mut documents = self.documents(collection);
        sort_recent_first(&mut documents);
        documents.truncate(limit);
        documents
    }

    fn notify(&self, collection: &str) {
        let targets: Vec<(usize, SnapshotListener)> = self
            .watchers
            .read()
            .iter()
            .filter(|w| w.collection == collection)
            .map(|w| (w.limit, Arc::clone(&w.listener)))
            .collect();

        for (limit, listener) in targets {
            listener(&self.snapshot(collection, limit));
        }
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn upsert(&self, collection: &str, mut document: RemoteDocument) -> SyncResult<DateTime<Utc>> {
        self.check_connected()?;
        self.consume_budget()?;

        let stamp = self.server_now();
        document.set_server_timestamp(stamp);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document);
        self.upserts.fetch_add(1, Ordering::SeqCst);

        self.notify(collection);
        Ok(stamp)
    }

    fn query_recent(&self, collection: &str, limit: usize) -> SyncResult<Vec<RemoteDocument>> {
        self.check_connected()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(collection, limit))
    }

    fn watch(
        &self,
        collection: &str,
        limit: usize,
        listener: SnapshotListener,
    ) -> SyncResult<Subscription> {
        self.check_connected()?;

        let id = self.next_watcher.fetch_add(1, Ordering::SeqCst);
        self.watchers.write().push(Watcher {
            id,
            collection: collection.to_string(),
            limit,
            listener: Arc::clone(&listener),
        });
        listener(&self.snapshot(collection, limit));

        let watchers = Arc::downgrade(&self.watchers);
        Ok(Subscription::new(move || {
            if let Some(watchers) = watchers.upgrade() {
                watchers.write().retain(|w| w.id != id);
            }
        }))
    }

    fn put_backup(&self, collection: &str, mut backup: Backup) -> SyncResult<DateTime<Utc>> {
        self.check_connected()?;

        let stamp = self.server_now();
        backup.timestamp = Some(stamp);
        self.backups
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(backup.id.clone(), backup);
        Ok(stamp)
    }

    fn get_backup(&self, collection: &str, id: &str) -> SyncResult<Option<Backup>> {
        self.check_connected()?;
        Ok(self
            .backups
            .read()
            .get(collection)
            .and_then(|backups| backups.get(id))
            .cloned())
    }
}
