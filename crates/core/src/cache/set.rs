//! Lazily opened storage handles, one per logical key.
//!
//! Keys are host names, the shared `file` key, or `mem` for the in-memory
//! layout. A handle is opened, tuned and migrated on first request and then
//! cached for the lifetime of the set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::connection::CacheDb;
use super::migrations::Schema;
use crate::Error;

const DB_EXTENSION: &str = "sqlite";

/// Where a set places its databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// One `<key>.sqlite` file per key under this directory.
    Dir(PathBuf),
    /// One private in-memory database per key.
    Memory,
}

/// Per-key storage handle cache.
///
/// Lookups of an already opened handle only take a read lock. Opening is
/// serialised behind a single mutex so that concurrent requests for the same
/// new key run migrations exactly once and all observe the same handle.
#[derive(Debug)]
pub struct StoreSet {
    location: Location,
    handles: RwLock<HashMap<String, CacheDb>>,
    opening: Mutex<()>,
}

impl StoreSet {
    pub fn new(location: Location) -> Self {
        Self { location, handles: RwLock::new(HashMap::new()), opening: Mutex::new(()) }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Location::Dir(dir.into()))
    }

    pub fn in_memory() -> Self {
        Self::new(Location::Memory)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Number of handles opened so far.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Database file backing `key`, if the set is file based.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        match &self.location {
            Location::Dir(dir) => Some(dir.join(format!("{}.{DB_EXTENSION}", file_stem(key)))),
            Location::Memory => None,
        }
    }

    /// Get the handle for `key`, opening it with `schema` on first use.
    ///
    /// # Errors
    ///
    /// Returns `Error::StorageInit` if the database cannot be opened or
    /// migrated. Nothing is cached on failure, so a later call retries.
    pub async fn get(&self, key: &str, schema: Schema) -> Result<CacheDb, Error> {
        if let Some(db) = self.cached(key) {
            return Ok(db);
        }

        let _guard = self.opening.lock().await;
        if let Some(db) = self.cached(key) {
            return Ok(db);
        }

        let db = self
            .open(key, schema)
            .await
            .map_err(|e| Error::StorageInit { key: key.to_string(), reason: e.to_string() })?;

        self.handles.write().insert(key.to_string(), db.clone());
        tracing::debug!(key, ?schema, "opened storage handle");

        Ok(db)
    }

    fn cached(&self, key: &str) -> Option<CacheDb> {
        self.handles.read().get(key).cloned()
    }

    async fn open(&self, key: &str, schema: Schema) -> Result<CacheDb, Error> {
        match &self.location {
            Location::Memory => CacheDb::open_in_memory_with(schema).await,
            Location::Dir(dir) => {
                ensure_dir(dir).await?;
                let path = dir.join(format!("{}.{DB_EXTENSION}", file_stem(key)));
                CacheDb::open(path, schema).await
            }
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::StorageInit { key: dir.display().to_string(), reason: e.to_string() })
}

/// Map a key onto a portable file stem.
///
/// ASCII alphanumerics, `.`, `-` and `_` are kept; everything else, such as
/// the `:` of `host:port`, becomes `_`.
fn file_stem(key: &str) -> String {
    if key.is_empty() {
        return "_".to_string();
    }
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}
