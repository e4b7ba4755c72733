//! End-to-end tests of the engine against the in-memory remote store.

use chrono::{NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use vitalsync_engine::{
    ConnectivityMonitor, EngineConfig, MemoryRemoteStore, SyncEngine, SyncError,
    DEFAULT_COLLECTION,
};
use vitalsync_protocol::{ConflictPolicy, HealthRecord, RemoteDocument};
use vitalsync_storage::{FileStore, InMemoryStore, KeyValueStore};

type MemoryEngine = SyncEngine<InMemoryStore, MemoryRemoteStore>;

struct Device {
    engine: Arc<MemoryEngine>,
    store: Arc<InMemoryStore>,
    connectivity: Arc<ConnectivityMonitor>,
}

fn device(remote: &Arc<MemoryRemoteStore>, online: bool, config: EngineConfig) -> Device {
    let store = Arc::new(InMemoryStore::new());
    let connectivity = Arc::new(ConnectivityMonitor::new(online));
    let engine = Arc::new(SyncEngine::new(
        config,
        Arc::clone(&store),
        Arc::clone(remote),
        Arc::clone(&connectivity),
    ));
    engine.start();
    Device {
        engine,
        store,
        connectivity,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn measurement(id: &str, date: NaiveDate, weight: f64) -> HealthRecord {
    HealthRecord {
        weight,
        fat_mass: 18.0,
        lean_mass: 52.0,
        muscle_percentage: 42.0,
        bone_percentage: 4.1,
        water_percentage: 56.0,
        sleep_hours: 7.5,
        training_hours: 4.0,
        bmi: 22.4,
        ..HealthRecord::new(id, date)
    }
}

fn remote_document(id: &str, date: &str, weight: f64, modified: &str) -> RemoteDocument {
    let value = json!({
        "date": date,
        "weight": weight,
        "fatMass": 15.0,
        "leanMass": 45.0,
        "musclePercentage": 40.0,
        "bonePercentage": 4.0,
        "waterPercentage": 55.0,
        "sleepHours": 8.0,
        "trainingHours": 2.0,
        "bmi": 21.0,
        "synced": true,
        "lastModified": modified,
    });
    match value {
        Value::Object(fields) => RemoteDocument::new(id, fields),
        _ => unreachable!(),
    }
}

#[test]
fn going_online_uploads_pending_record() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new());

    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let mut record = measurement("a", day(1), 80.0);
    record.last_modified = Some(t0);
    phone.engine.save_local(record).unwrap();
    assert!(phone.engine.sync_status().has_pending_changes);
    assert_eq!(remote.upsert_count(), 0);

    phone.connectivity.set_online(true);

    let uploaded = remote.document(DEFAULT_COLLECTION, "a").unwrap();
    assert_eq!(uploaded.fields["synced"], true);
    let server_time = uploaded.last_modified().unwrap();
    assert!(server_time > t0);

    let local = phone.engine.get_local_data();
    assert!(local[0].synced);
    assert_eq!(local[0].last_modified, Some(server_time));
    assert!(!phone.engine.sync_status().has_pending_changes);
}

// Remote documents must carry every measurement field. A bare
// `{id: "x", weight: 60}` is rejected at decode, so the download scenario
// uses a complete document with weight 60.
#[test]
fn download_into_empty_cache() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("x", "2024-03-04", 60.0, "2024-03-04T07:00:00.000Z"),
    );
    let mut bare = Map::new();
    bare.insert("weight".into(), json!(60));
    remote.insert_raw(DEFAULT_COLLECTION, RemoteDocument::new("bare", bare));
    let tablet = device(&remote, true, EngineConfig::new());

    let before = Utc::now() - chrono::Duration::seconds(1);
    let merged = tablet.engine.sync_from_cloud().unwrap();

    assert_eq!(tablet.engine.stats().documents_rejected, 1);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].id, "x");
    assert_eq!(merged[0].weight, 60.0);
    assert_eq!(tablet.engine.get_local_data(), merged);

    let status = tablet.engine.sync_status();
    assert!(status.last_sync.unwrap() >= before);
    assert!(!status.has_pending_changes);
}

#[test]
fn offline_upload_touches_nothing() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 75.0)).unwrap();

    let before = phone.engine.sync_status();
    let report = phone.engine.sync_to_cloud().unwrap();

    assert!(report.skipped);
    assert_eq!(remote.upsert_count(), 0);
    assert_eq!(phone.engine.sync_status(), before);
}

#[test]
fn offline_download_returns_cache() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("x", "2024-03-04", 60.0, "2024-03-04T07:00:00.000Z"),
    );
    let phone = device(&remote, false, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 75.0)).unwrap();

    let records = phone.engine.sync_from_cloud().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(remote.query_count(), 0);
}

#[test]
fn two_devices_converge() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());
    let laptop = device(&remote, true, EngineConfig::new());

    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();
    laptop.engine.save_local(measurement("", day(2), 79.5)).unwrap();

    let phone_view = phone.engine.sync_from_cloud().unwrap();
    let laptop_view = laptop.engine.sync_from_cloud().unwrap();

    assert_eq!(phone_view.len(), 2);
    assert_eq!(phone_view, laptop_view);
    assert_eq!(phone_view[0].date, day(2));
}

#[test]
fn client_wins_keeps_local_edit_until_uploaded() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new().with_auto_sync(false));
    phone.engine.set_conflict_resolution(ConflictPolicy::ClientWins);
    phone.engine.save_local(measurement("a", day(1), 80.0)).unwrap();

    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("a", "2024-03-01", 70.0, "2099-01-01T00:00:00.000Z"),
    );
    phone.connectivity.set_online(true);

    let merged = phone.engine.sync_from_cloud().unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].weight, 80.0);
    assert!(phone.engine.sync_status().has_pending_changes);
    assert_eq!(phone.engine.stats().local_wins, 1);

    assert_eq!(phone.engine.sync_to_cloud().unwrap().uploaded, 1);
    let stored = remote.document(DEFAULT_COLLECTION, "a").unwrap();
    assert_eq!(stored.fields["weight"], 80.0);
}

#[test]
fn latest_wins_prefers_newer_remote() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(
        &remote,
        false,
        EngineConfig::new()
            .with_auto_sync(false)
            .with_default_policy(ConflictPolicy::LatestWins),
    );
    phone.engine.save_local(measurement("old", day(1), 80.0)).unwrap();
    phone.engine.save_local(measurement("new", day(2), 81.0)).unwrap();

    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("old", "2024-03-01", 70.0, "2099-01-01T00:00:00.000Z"),
    );
    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("new", "2024-03-02", 71.0, "2020-01-01T00:00:00.000Z"),
    );
    phone.connectivity.set_online(true);

    let merged = phone.engine.sync_from_cloud().unwrap();
    let weight = |id: &str| merged.iter().find(|r| r.id == id).unwrap().weight;
    assert_eq!(weight("old"), 70.0);
    assert_eq!(weight("new"), 81.0);
}

#[test]
fn server_wins_replaces_pending_local_record() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new().with_auto_sync(false));
    phone.engine.save_local(measurement("a", day(1), 80.0)).unwrap();

    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("a", "2024-03-01", 70.0, "2024-03-01T06:00:00.000Z"),
    );
    phone.connectivity.set_online(true);

    let merged = phone.engine.sync_from_cloud().unwrap();
    assert_eq!(merged[0].weight, 70.0);
    assert!(merged[0].synced);
    assert!(!phone.engine.sync_status().has_pending_changes);
}

#[test]
fn malformed_remote_documents_are_skipped() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("good", "2024-03-02", 65.0, "2024-03-02T07:00:00.000Z"),
    );
    let mut broken = Map::new();
    broken.insert("weight".into(), json!("heavy"));
    remote.insert_raw(DEFAULT_COLLECTION, RemoteDocument::new("bad", broken));

    let phone = device(&remote, true, EngineConfig::new());
    let merged = phone.engine.sync_from_cloud().unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].id, "good");
    assert_eq!(phone.engine.stats().documents_rejected, 1);
}

#[test]
fn download_failure_propagates() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 75.0)).unwrap();

    remote.set_connected(false);
    assert!(matches!(
        phone.engine.sync_from_cloud(),
        Err(SyncError::NotConnected)
    ));
    assert_eq!(phone.engine.get_local_data().len(), 1);
}

#[test]
fn live_feed_merges_until_unsubscribed() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());
    let deliveries = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&deliveries);
    let subscription = phone
        .engine
        .subscribe_to_cloud_updates(move |records| sink.lock().push(records.len()))
        .unwrap();

    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("x", "2024-03-04", 60.0, "2024-03-04T07:00:00.000Z"),
    );
    assert_eq!(phone.engine.get_local_data().len(), 1);

    subscription.unsubscribe();
    assert_eq!(remote.watcher_count(), 0);
    remote.insert_raw(
        DEFAULT_COLLECTION,
        remote_document("y", "2024-03-05", 61.0, "2024-03-05T07:00:00.000Z"),
    );

    assert_eq!(*deliveries.lock(), vec![0, 1]);
    assert_eq!(phone.engine.get_local_data().len(), 1);
}

#[test]
fn live_feed_survives_upload_inside_pass() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());
    let deliveries = Arc::new(Mutex::new(0));

    let sink = Arc::clone(&deliveries);
    let _subscription = phone
        .engine
        .subscribe_to_cloud_updates(move |_| *sink.lock() += 1)
        .unwrap();

    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();

    assert_eq!(*deliveries.lock(), 2);
    let local = phone.engine.get_local_data();
    assert_eq!(local.len(), 1);
    assert!(local[0].synced);
}

#[test]
fn offline_feed_delivers_cache_once() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();

    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&deliveries);
    let subscription = phone
        .engine
        .subscribe_to_cloud_updates(move |records| sink.lock().push(records.len()))
        .unwrap();

    assert!(!subscription.is_active());
    assert_eq!(*deliveries.lock(), vec![1]);
    assert_eq!(remote.watcher_count(), 0);
}

#[test]
fn export_import_round_trip() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let source = device(&remote, false, EngineConfig::new());
    source.engine.save_local(measurement("", day(1), 80.0)).unwrap();
    let mut noted = measurement("", day(2), 79.0);
    noted.notes = Some("after holiday".into());
    source.engine.save_local(noted).unwrap();

    let exported = source.engine.export_data().unwrap();

    let target = device(&remote, false, EngineConfig::new());
    assert_eq!(target.engine.import_data(&exported).unwrap(), 2);

    let original = source.engine.get_local_data();
    let imported = target.engine.get_local_data();
    assert_eq!(imported.len(), original.len());
    for (before, after) in original.iter().zip(&imported) {
        assert!(after.id.starts_with("imported_"));
        assert_ne!(after.id, before.id);
        assert!(!after.synced);
        assert_eq!(after.weight, before.weight);
        assert_eq!(after.notes, before.notes);
        assert_eq!(after.last_modified, before.last_modified);
    }
    assert!(target.engine.sync_status().has_pending_changes);
}

#[test]
fn malformed_import_changes_nothing() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();

    let payload = r#"[{"date": "2024-03-02", "weight": 70}, 5]"#;
    assert!(matches!(
        phone.engine.import_data(payload),
        Err(SyncError::InvalidFormat(_))
    ));
    assert_eq!(phone.engine.get_local_data().len(), 1);
}

#[test]
fn csv_export_lists_every_record() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();
    phone.engine.save_local(measurement("", day(2), 79.0)).unwrap();

    let csv = phone.engine.export_csv().unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().nth(1).unwrap().starts_with("2024-03-01,80,"));
}

#[test]
fn backup_and_restore() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());
    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();
    phone.engine.save_local(measurement("", day(2), 79.0)).unwrap();

    let backup_id = phone.engine.create_backup().unwrap();
    assert!(backup_id.starts_with("backup_"));

    let fresh = device(&remote, true, EngineConfig::new());
    assert_eq!(fresh.engine.restore_from_backup(&backup_id).unwrap(), 2);
    assert_eq!(fresh.engine.get_local_data(), phone.engine.get_local_data());
    assert!(fresh.engine.sync_status().last_sync.is_some());
    assert!(!fresh.engine.sync_status().has_pending_changes);
}

#[test]
fn quota_exceeded_propagates_from_save() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let store = Arc::new(InMemoryStore::with_capacity(400));
    let engine = SyncEngine::new(
        EngineConfig::new(),
        store,
        remote,
        Arc::new(ConnectivityMonitor::new(false)),
    );

    let err = engine
        .save_local(HealthRecord {
            notes: Some("x".repeat(1000)),
            ..measurement("", day(1), 80.0)
        })
        .unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
    assert!(engine.get_local_data().is_empty());
}

#[test]
fn corrupt_cache_reads_as_empty_and_recovers() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, false, EngineConfig::new().with_keys("records", "status"));
    phone.store.set("records", "\u{0}garbage").unwrap();

    assert!(phone.engine.get_local_data().is_empty());
    phone.engine.save_local(measurement("", day(1), 80.0)).unwrap();
    assert_eq!(phone.engine.get_local_data().len(), 1);
}

#[test]
fn status_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemoteStore::new());

    {
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let engine = Arc::new(SyncEngine::new(
            EngineConfig::new(),
            store,
            Arc::clone(&remote),
            Arc::new(ConnectivityMonitor::new(false)),
        ));
        engine.start();
        engine.set_conflict_resolution(ConflictPolicy::LatestWins);
        engine.save_local(measurement("", day(1), 80.0)).unwrap();
        engine.shutdown();
    }

    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let engine = SyncEngine::new(
        EngineConfig::new(),
        store,
        remote,
        Arc::new(ConnectivityMonitor::new(true)),
    );

    let status = engine.sync_status();
    assert_eq!(status.conflict_resolution, ConflictPolicy::LatestWins);
    assert!(status.has_pending_changes);
    assert!(status.is_online);
    assert_eq!(engine.get_local_data().len(), 1);
}

#[test]
fn concurrent_saves_lose_nothing() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let phone = device(&remote, true, EngineConfig::new());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&phone.engine);
            std::thread::spawn(move || {
                for i in 0..5 {
                    engine
                        .save_local(measurement("", day(1 + worker * 5 + i), 70.0))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let local = phone.engine.get_local_data();
    assert_eq!(local.len(), 20);
    assert!(local.iter().all(|r| r.synced));
    assert_eq!(remote.documents(DEFAULT_COLLECTION).len(), 20);
    assert!(!phone.engine.sync_status().has_pending_changes);
}
