//! Database directory holding named collections.

use super::collection::LogCollection;
use super::Collection;
use crate::error::{BackingError, BackingResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Magic bytes for the database manifest.
const DB_MAGIC: &[u8; 4] = b"BMG\0";

/// Current database format version.
const DB_VERSION: u8 = 1;

/// File extension of collection logs.
const COLLECTION_EXT: &str = "log";

/// Database configuration.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Database directory.
    pub path: PathBuf,

    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync collection logs every N writes (0 or 1 = every write).
    pub sync_interval: u64,

    /// Documents kept in each collection's read cache.
    pub cache_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./boomega-db"),
            create_if_missing: true,
            sync_interval: 1,
            cache_size: 1000,
        }
    }
}

/// An open database directory.
///
/// Holds an exclusive lock on the directory for as long as it is open.
pub struct Database {
    config: DatabaseConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Collections opened so far, by name.
    collections: Mutex<HashMap<String, Arc<LogCollection>>>,

    closed: AtomicBool,
}

impl Database {
    /// Open an existing database or create a new one.
    pub fn open_or_create(config: DatabaseConfig) -> BackingResult<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(BackingError::NotInitialized)
        }
    }

    /// Create a new database.
    pub fn create(config: DatabaseConfig) -> BackingResult<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        info!(path = %config.path.display(), "created database");
        Ok(Self::new(config, lock_file))
    }

    /// Open an existing database.
    pub fn open(config: DatabaseConfig) -> BackingResult<Self> {
        Self::verify_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        info!(path = %config.path.display(), "opened database");
        Ok(Self::new(config, lock_file))
    }

    fn new(config: DatabaseConfig, lock_file: File) -> Self {
        Self {
            config,
            _lock_file: lock_file,
            collections: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a named collection, enforcing unique values on `unique_fields`.
    ///
    /// Repeated calls return the same shared handle; the unique fields of the
    /// first call apply.
    pub fn collection(
        &self,
        name: &str,
        unique_fields: &[String],
    ) -> BackingResult<Arc<LogCollection>> {
        if self.is_closed() {
            return Err(BackingError::Closed);
        }
        Self::validate_name(name)?;

        let mut collections = self.collections.lock();
        if let Some(existing) = collections.get(name) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing));
            }
        }

        let path = self
            .config
            .path
            .join(format!("{}.{}", name, COLLECTION_EXT));
        let collection = Arc::new(LogCollection::open(
            name,
            path,
            unique_fields.to_vec(),
            self.config.sync_interval,
            self.config.cache_size,
        )?);

        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Names of all collections stored in the database directory.
    pub fn collection_names(&self) -> BackingResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(COLLECTION_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Close every open collection.
    pub fn close(&self) -> BackingResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let collections: Vec<_> = self.collections.lock().drain().map(|(_, c)| c).collect();
        for collection in collections {
            collection.close()?;
        }

        info!(path = %self.config.path.display(), "closed database");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Private Helpers ---

    fn validate_name(name: &str) -> BackingResult<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(BackingError::InvalidName(name.to_string()))
        }
    }

    fn write_manifest(path: &Path) -> BackingResult<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(DB_MAGIC)?;
        file.write_all(&[DB_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> BackingResult<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != DB_MAGIC {
            return Err(BackingError::InvalidFormat("Invalid database magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != DB_VERSION {
            return Err(BackingError::InvalidFormat(format!(
                "Unsupported database version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> BackingResult<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| BackingError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best-effort flush on drop
        let _ = self.close();
    }
}
