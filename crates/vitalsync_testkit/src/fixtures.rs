//! Test fixtures and engine helpers.
//!
//! Provides sample data and ready-wired engines backed by in-memory or
//! temporary on-disk storage.

use chrono::{Days, NaiveDate, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vitalsync_engine::{ConnectivityMonitor, EngineConfig, MemoryRemoteStore, SyncEngine};
use vitalsync_protocol::{calculate_bmi, HealthRecord};
use vitalsync_storage::{FileStore, InMemoryStore};

/// Engine over in-memory local and remote stores.
pub type MemoryEngine = SyncEngine<InMemoryStore, MemoryRemoteStore>;

/// Engine over a file store and an in-memory remote.
pub type FileEngine = SyncEngine<FileStore, MemoryRemoteStore>;

/// Height used for sample BMI values.
pub const SAMPLE_HEIGHT_CM: f64 = 170.0;

/// First day of the sample series.
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// Twelve weekly records starting at `start`, already synced.
///
/// Weight drifts down by 0.3 kg a week from 84.6 kg while training and
/// sleep increase; every third week carries a note.
pub fn sample_records(start: NaiveDate) -> Vec<HealthRecord> {
    (0..12u32)
        .map(|i| {
            let week = f64::from(i);
            let date = start + Days::new(u64::from(i) * 7);
            let weight = 84.6 - week * 0.3;
            let midnight = date.and_hms_opt(0, 0, 0).expect("valid time");

            HealthRecord {
                weight,
                fat_mass: 31.91 - week * 0.15,
                lean_mass: 49.78 + week * 0.05,
                muscle_percentage: 55.2 + week * 0.1,
                bone_percentage: 3.6,
                water_percentage: 42.7 + week * 0.2,
                sleep_hours: 6.0 + week * 0.1,
                training_hours: 3.0 + week * 0.2,
                bmi: calculate_bmi(weight, SAMPLE_HEIGHT_CM).unwrap_or_default(),
                notes: (i % 3 == 0).then(|| "rehearsal day".to_string()),
                synced: true,
                last_modified: Some(Utc.from_utc_datetime(&midnight)),
                ..HealthRecord::new(format!("sample_{i}"), date)
            }
        })
        .collect()
}

/// A valid, unsynced record with no ID.
pub fn record_on(date: NaiveDate, weight: f64) -> HealthRecord {
    HealthRecord {
        weight,
        fat_mass: 20.0,
        lean_mass: 55.0,
        muscle_percentage: 40.0,
        bone_percentage: 4.0,
        water_percentage: 55.0,
        sleep_hours: 7.0,
        training_hours: 3.0,
        bmi: calculate_bmi(weight, SAMPLE_HEIGHT_CM).unwrap_or_default(),
        ..HealthRecord::new("", date)
    }
}

/// A started engine over in-memory stores.
pub struct TestEngine {
    /// The engine.
    pub engine: Arc<MemoryEngine>,
    /// The local store.
    pub store: Arc<InMemoryStore>,
    /// The remote store, possibly shared with other devices.
    pub remote: Arc<MemoryRemoteStore>,
    /// The connectivity signal.
    pub connectivity: Arc<ConnectivityMonitor>,
}

impl TestEngine {
    /// Creates an online engine with its own remote.
    pub fn online() -> Self {
        Self::with_config(EngineConfig::default(), true)
    }

    /// Creates an offline engine with its own remote.
    pub fn offline() -> Self {
        Self::with_config(EngineConfig::default(), false)
    }

    /// Creates an engine with its own remote.
    pub fn with_config(config: EngineConfig, online: bool) -> Self {
        Self::attached(&Arc::new(MemoryRemoteStore::new()), config, online)
    }

    /// Creates an engine talking to an existing remote.
    pub fn attached(remote: &Arc<MemoryRemoteStore>, config: EngineConfig, online: bool) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        let engine = Arc::new(SyncEngine::new(
            config,
            Arc::clone(&store),
            Arc::clone(remote),
            Arc::clone(&connectivity),
        ));
        engine.start();

        Self {
            engine,
            store,
            remote: Arc::clone(remote),
            connectivity,
        }
    }

    /// Flips the connectivity signal to online.
    pub fn go_online(&self) {
        self.connectivity.set_online(true);
    }

    /// Flips the connectivity signal to offline.
    pub fn go_offline(&self) {
        self.connectivity.set_online(false);
    }
}

impl std::ops::Deref for TestEngine {
    type Target = MemoryEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// A started engine over a file store in a temporary directory.
pub struct FileTestEngine {
    /// The engine.
    pub engine: Arc<FileEngine>,
    /// The remote store.
    pub remote: Arc<MemoryRemoteStore>,
    config: EngineConfig,
    temp_dir: TempDir,
}

impl FileTestEngine {
    /// Creates an engine in a fresh temporary directory.
    pub fn new(config: EngineConfig, online: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = Self::open_engine(temp_dir.path(), &config, &remote, online);

        Self {
            engine,
            remote,
            config,
            temp_dir,
        }
    }

    /// Returns the storage directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Drops the engine and reopens the same directory, as after a process
    /// restart.
    pub fn restart(self, online: bool) -> Self {
        let Self {
            engine,
            remote,
            config,
            temp_dir,
        } = self;
        engine.shutdown();
        drop(engine);

        let engine = Self::open_engine(temp_dir.path(), &config, &remote, online);
        Self {
            engine,
            remote,
            config,
            temp_dir,
        }
    }

    fn open_engine(
        dir: &Path,
        config: &EngineConfig,
        remote: &Arc<MemoryRemoteStore>,
        online: bool,
    ) -> Arc<FileEngine> {
        let store = Arc::new(FileStore::open(dir).expect("Failed to open file store"));
        let engine = Arc::new(SyncEngine::new(
            config.clone(),
            store,
            Arc::clone(remote),
            Arc::new(ConnectivityMonitor::new(online)),
        ));
        engine.start();
        engine
    }
}

/// Runs a test against a fresh offline engine.
pub fn with_offline_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    f(&TestEngine::offline())
}

/// Runs a test against a fresh online engine.
pub fn with_online_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    f(&TestEngine::online())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// An offline engine holding `count` pending daily records.
    pub fn populated_engine(count: usize) -> TestEngine {
        let device = TestEngine::offline();
        let mut date = start_date();
        for i in 0..count {
            device
                .engine
                .save_local(record_on(date, 70.0 + (i % 10) as f64))
                .expect("Failed to save record");
            date = date.succ_opt().expect("date in range");
        }
        device
    }

    /// Two online devices sharing one remote, with auto-sync disabled so
    /// tests control when uploads happen.
    pub fn two_devices() -> (TestEngine, TestEngine) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let config = EngineConfig::default().with_auto_sync(false);
        (
            TestEngine::attached(&remote, config.clone(), true),
            TestEngine::attached(&remote, config, true),
        )
    }

    /// A remote pre-loaded with the sample series.
    pub fn seeded_remote() -> Arc<MemoryRemoteStore> {
        let remote = Arc::new(MemoryRemoteStore::new());
        for record in sample_records(start_date()) {
            let document = record.to_document().expect("Failed to encode record");
            remote.insert_raw(vitalsync_engine::DEFAULT_COLLECTION, document);
        }
        remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalsync_protocol::validate_record;

    #[test]
    fn sample_series_is_valid_and_weekly() {
        let records = sample_records(start_date());
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].bmi, 29.3);
        assert_eq!(records[1].date, start_date() + Days::new(7));
        assert_eq!(records[3].notes.as_deref(), Some("rehearsal day"));
        assert!(records[1].notes.is_none());
        for record in &records {
            assert!(validate_record(record).is_empty(), "{record:?}");
        }
    }

    #[test]
    fn populated_scenario() {
        let device = scenarios::populated_engine(5);
        assert_eq!(device.get_local_data().len(), 5);
        assert!(device.sync_status().has_pending_changes);
    }

    #[test]
    fn seeded_remote_downloads() {
        let remote = scenarios::seeded_remote();
        let device = TestEngine::attached(&remote, EngineConfig::default(), true);
        let merged = device.sync_from_cloud().expect("download");
        assert_eq!(merged.len(), 12);
        assert_eq!(merged[0].id, "sample_11");
    }

    #[test]
    fn file_engine_restarts() {
        let device = FileTestEngine::new(EngineConfig::default(), false);
        device
            .engine
            .save_local(record_on(start_date(), 80.0))
            .expect("save");

        let device = device.restart(false);
        assert_eq!(device.engine.get_local_data().len(), 1);
        assert!(device.path().join("LOCK").exists());
    }

    #[test]
    fn with_engine_helpers() {
        let count = with_offline_engine(|device| {
            device.save_local(record_on(start_date(), 75.0)).expect("save");
            device.get_local_data().len()
        });
        assert_eq!(count, 1);
        assert!(with_online_engine(|device| device.sync_status().is_online));
    }
}
