//! CLI command implementations.

pub mod backup;
pub mod records;
pub mod summary;
pub mod sync;
pub mod transfer;

use crate::remote::FileRemoteStore;
use std::path::PathBuf;
use std::sync::Arc;
use vitalsync_engine::{ConnectivityMonitor, EngineConfig, SyncEngine};
use vitalsync_storage::FileStore;

/// Engine type used by every command.
pub type CliEngine = SyncEngine<FileStore, FileRemoteStore>;

/// Result type shared by command implementations.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Where the local data and the remote emulator live.
#[derive(Debug, Clone)]
pub struct Session {
    /// Local data directory.
    pub path: PathBuf,
    /// Remote emulator directory.
    pub remote: PathBuf,
    /// Run without connectivity.
    pub offline: bool,
}

impl Session {
    /// Opens a started engine with the default configuration.
    pub fn open(&self) -> Result<Arc<CliEngine>, Box<dyn std::error::Error>> {
        self.open_with(EngineConfig::default())
    }

    /// Opens a started engine.
    ///
    /// Starting an online engine uploads anything left pending by an
    /// earlier offline run.
    pub fn open_with(
        &self,
        config: EngineConfig,
    ) -> Result<Arc<CliEngine>, Box<dyn std::error::Error>> {
        if self.path == self.remote {
            return Err("local and remote directories must differ".into());
        }

        let store = Arc::new(FileStore::open(&self.path)?);
        let remote = Arc::new(FileRemoteStore::open(&self.remote)?);
        let connectivity = Arc::new(ConnectivityMonitor::new(!self.offline));

        let engine = Arc::new(SyncEngine::new(config, store, remote, connectivity));
        engine.start();
        Ok(engine)
    }
}
