//! File-backed remote store emulator.
//!
//! Stands in for a cloud document store so the CLI can push and pull
//! between several local directories. Each collection is one JSON object
//! (`id -> fields`) stored under the key `remote_<collection>` of a
//! [`FileStore`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use vitalsync_engine::{sort_recent_first, RemoteStore, SnapshotListener, Subscription, SyncResult};
use vitalsync_protocol::{timestamp, Backup, RemoteDocument};
use vitalsync_storage::{FileStore, KeyValueStore};

type Documents = BTreeMap<String, Map<String, Value>>;

/// A remote store persisted in a local directory.
///
/// Watches deliver the current snapshot once; writes from other processes
/// are only seen by the next query.
pub struct FileRemoteStore {
    store: FileStore,
    write_lock: Mutex<Option<DateTime<Utc>>>,
}

impl FileRemoteStore {
    /// Opens (or creates) the emulator directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or another process holds it.
    pub fn open(dir: &Path) -> SyncResult<Self> {
        Ok(Self {
            store: FileStore::open(dir)?,
            write_lock: Mutex::new(None),
        })
    }

    fn key(collection: &str) -> String {
        format!("remote_{collection}")
    }

    fn load<T: DeserializeOwned + Default>(&self, collection: &str) -> SyncResult<T> {
        match self.store.get(&Self::key(collection))? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(T::default()),
        }
    }

    fn save<T: Serialize>(&self, collection: &str, value: &T) -> SyncResult<()> {
        let text = serde_json::to_string(value)?;
        self.store.set(&Self::key(collection), &text)?;
        Ok(())
    }

    /// Next server timestamp; `last` holds the previous one.
    fn stamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = timestamp::now();
        let stamp = match *last {
            Some(previous) if previous >= now => previous + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    fn snapshot(&self, collection: &str, limit: usize) -> SyncResult<Vec<RemoteDocument>> {
        let documents: Documents = self.load(collection)?;
        let mut documents: Vec<RemoteDocument> = documents
            .into_iter()
            .map(|(id, fields)| RemoteDocument::new(id, fields))
            .collect();
        sort_recent_first(&mut documents);
        documents.truncate(limit);
        Ok(documents)
    }
}

impl RemoteStore for FileRemoteStore {
    fn upsert(&self, collection: &str, mut document: RemoteDocument) -> SyncResult<DateTime<Utc>> {
        let mut last = self.write_lock.lock();
        let stamp = Self::stamp(&mut last);
        document.set_server_timestamp(stamp);

        let mut documents: Documents = self.load(collection)?;
        documents.insert(document.id, document.fields);
        self.save(collection, &documents)?;
        Ok(stamp)
    }

    fn query_recent(&self, collection: &str, limit: usize) -> SyncResult<Vec<RemoteDocument>> {
        self.snapshot(collection, limit)
    }

    fn watch(
        &self,
        collection: &str,
        limit: usize,
        listener: SnapshotListener,
    ) -> SyncResult<Subscription> {
        listener(&self.snapshot(collection, limit)?);
        Ok(Subscription::inert())
    }

    fn put_backup(&self, collection: &str, mut backup: Backup) -> SyncResult<DateTime<Utc>> {
        let mut last = self.write_lock.lock();
        let stamp = Self::stamp(&mut last);
        backup.timestamp = Some(stamp);

        let mut backups: BTreeMap<String, Backup> = self.load(collection)?;
        backups.insert(backup.id.clone(), backup);
        self.save(collection, &backups)?;
        Ok(stamp)
    }

    fn get_backup(&self, collection: &str, id: &str) -> SyncResult<Option<Backup>> {
        let mut backups: BTreeMap<String, Backup> = self.load(collection)?;
        Ok(backups.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vitalsync_engine::SyncError;
    use vitalsync_protocol::HealthRecord;

    fn document(id: &str, weight: f64) -> RemoteDocument {
        HealthRecord {
            weight,
            ..HealthRecord::new(id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        }
        .to_document()
        .unwrap()
    }

    #[test]
    fn upsert_stamps_and_persists() {
        let dir = TempDir::new().unwrap();
        let first;
        {
            let remote = FileRemoteStore::open(dir.path()).unwrap();
            first = remote.upsert("records", document("a", 80.0)).unwrap();
            let second = remote.upsert("records", document("b", 81.0)).unwrap();
            assert!(second > first);
        }

        let remote = FileRemoteStore::open(dir.path()).unwrap();
        let docs = remote.query_recent("records", 10).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "b");
        assert_eq!(docs[1].last_modified(), Some(first));
    }

    #[test]
    fn upsert_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let remote = FileRemoteStore::open(dir.path()).unwrap();
        remote.upsert("records", document("a", 80.0)).unwrap();
        remote.upsert("records", document("a", 75.0)).unwrap();

        let docs = remote.query_recent("records", 10).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["weight"], 75.0);
    }

    #[test]
    fn query_respects_limit() {
        let dir = TempDir::new().unwrap();
        let remote = FileRemoteStore::open(dir.path()).unwrap();
        for i in 0..5 {
            remote.upsert("records", document(&format!("r{i}"), 70.0)).unwrap();
        }
        let docs = remote.query_recent("records", 3).unwrap();
        assert_eq!(
            docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            ["r4", "r3", "r2"]
        );
    }

    #[test]
    fn watch_delivers_snapshot_once() {
        let dir = TempDir::new().unwrap();
        let remote = FileRemoteStore::open(dir.path()).unwrap();
        remote.upsert("records", document("a", 80.0)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = remote
            .watch(
                "records",
                10,
                Arc::new(move |docs: &[RemoteDocument]| sink.lock().push(docs.len())),
            )
            .unwrap();

        remote.upsert("records", document("b", 80.0)).unwrap();
        assert_eq!(*seen.lock(), vec![1]);
        assert!(!subscription.is_active());
    }

    #[test]
    fn backups_round_trip() {
        let dir = TempDir::new().unwrap();
        let remote = FileRemoteStore::open(dir.path()).unwrap();
        let record = HealthRecord::new("a", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        remote
            .put_backup("backups", Backup::new("backup_1", vec![record.clone()]))
            .unwrap();
        let backup = remote.get_backup("backups", "backup_1").unwrap().unwrap();
        assert_eq!(backup.records, vec![record]);
        assert!(backup.timestamp.is_some());
        assert!(remote.get_backup("backups", "missing").unwrap().is_none());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _remote = FileRemoteStore::open(dir.path()).unwrap();
        assert!(matches!(
            FileRemoteStore::open(dir.path()),
            Err(SyncError::Storage(_))
        ));
    }
}
