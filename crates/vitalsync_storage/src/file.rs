//! File-based key-value store for persistent storage.

use crate::backend::{validate_key, KeyValueStore};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Advisory lock for single-writer access to the directory.
const LOCK_FILE: &str = "LOCK";
/// Extension of value files.
const VALUE_EXT: &str = "val";
/// Extension of the temporary file used for atomic writes.
const TEMP_EXT: &str = "val.tmp";

/// A directory-backed key-value store.
///
/// Each key is stored in its own file:
///
/// ```text
/// <dir>/
/// ├─ LOCK                     # Advisory lock for single-writer
/// ├─ vitalsync_records.val    # One file per key
/// └─ vitalsync_status.val
/// ```
///
/// # Durability
///
/// `set` writes to a temporary file, syncs it and renames it over the
/// previous value, so a crash leaves either the old or the new value.
///
/// # Thread Safety
///
/// The store holds an exclusive `fs2` lock on the directory for its whole
/// lifetime. Writes within the process are serialized by an internal mutex.
///
/// # Example
///
/// ```no_run
/// use vitalsync_storage::{KeyValueStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("vitalsync-data")).unwrap();
/// store.set("records", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    capacity: Option<usize>,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns [`StorageError::Locked`])
    /// - I/O errors occur
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            capacity: None,
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Sets a capacity (in bytes, summed over all values).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Returns the directory backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{VALUE_EXT}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{TEMP_EXT}"))
    }

    /// Total size of every value file except the one for `skip_key`.
    fn used_bytes_excluding(&self, skip_key: &str) -> StorageResult<usize> {
        let skip = format!("{skip_key}.{VALUE_EXT}");
        let mut total = 0usize;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == skip || !name.ends_with(&format!(".{VALUE_EXT}")) {
                continue;
            }
            total += entry.metadata()?.len() as usize;
        }

        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        match fs::read(self.value_path(key)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Corrupted(format!("{key}: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        if let Some(capacity) = self.capacity {
            let requested = self.used_bytes_excluding(key)? + value.len();
            if requested > capacity {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    requested,
                    capacity,
                });
            }
        }

        let temp = self.temp_path(key);
        {
            let mut file = File::create(&temp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, self.value_path(key))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
