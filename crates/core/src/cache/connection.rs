//! Storage handle with pragma tuning.
//!
//! This module handles opening a SQLite database, applying the fixed
//! performance policy (WAL, relaxed durability, bounded busy wait, fixed
//! page size), and running the migrations for its [`Schema`].

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations::{self, Schema};
use crate::Error;

/// Tuning applied to every handle.
///
/// `page_size` has to precede `journal_mode=WAL` and only takes effect on a
/// fresh database file.
const PRAGMAS: &str = "PRAGMA page_size=8192;
     PRAGMA auto_vacuum=NONE;
     PRAGMA journal_mode=WAL;
     PRAGMA synchronous=OFF;
     PRAGMA busy_timeout=3000;
     PRAGMA wal_autocheckpoint=2000;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Storage handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread. Cloning is cheap and clones share the connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies the pragma policy, and
    /// runs any pending migrations for `schema`.
    pub async fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .await
            .map_err(|e| Error::StorageInit { key: path.display().to_string(), reason: e.to_string() })?;

        Self::init(conn, schema).await
    }

    /// Open an in-memory database carrying every table.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Self::open_in_memory_with(Schema::All).await
    }

    /// Open an in-memory database carrying the tables of `schema`.
    pub async fn open_in_memory_with(schema: Schema) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::StorageInit { key: ":memory:".into(), reason: e.to_string() })?;

        Self::init(conn, schema).await
    }

    async fn init(conn: Connection, schema: Schema) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(|e| Error::StorageInit { key: "pragma".into(), reason: e.to_string() })?;

        migrations::run(&conn, schema).await?;

        Ok(Self { conn })
    }
}
