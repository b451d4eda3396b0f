//! Response record CRUD operations.
//!
//! One row per `(method, url)`. The upsert is the only mutation path; the
//! caller picks what happens on a key collision.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use crate::Error;

/// A cached response for one `(method, url)` pair.
///
/// The three encodings are kept apart: `origin_encoding` is what the origin
/// sent, `storage_encoding` is what `body` is persisted in. The delivery
/// encoding is decided per request and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponseRecord {
    pub method: String,
    pub url: String,
    pub host: String,
    pub path: String,
    /// Protocol string such as `HTTP/1.1`.
    pub proto: String,
    pub status_code: u16,
    /// Header map as JSON (`{"name": ["value", ...]}`).
    pub header: String,
    pub origin_encoding: String,
    pub storage_encoding: String,
    /// Decoded body size.
    pub raw_size: i64,
    /// Size of `body` as stored; zero once offloaded.
    pub body_size: i64,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub content_type: String,
    /// Set only when the body lives in the file store.
    pub content_hash: Option<String>,
    pub file_name: Option<String>,
}

impl HttpResponseRecord {
    /// Whether the body was moved to the file store.
    pub fn is_offloaded(&self) -> bool {
        self.content_hash.is_some()
    }
}

/// What an upsert does when `(method, url)` already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conflict {
    /// Overwrite every column of the existing row.
    #[default]
    ReplaceAll,
    /// Leave the existing row untouched.
    KeepExisting,
}

/// Listing row: record metadata without the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: String,
    pub storage_encoding: String,
    pub raw_size: i64,
    pub body_size: i64,
    pub content_hash: Option<String>,
    pub updated_at: String,
}

const RECORD_COLUMNS: &str = "method, url, host, path, proto, status_code, header,
    origin_encoding, storage_encoding, raw_size, body_size, body,
    content_type, content_hash, file_name";

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HttpResponseRecord> {
    Ok(HttpResponseRecord {
        method: row.get(0)?,
        url: row.get(1)?,
        host: row.get(2)?,
        path: row.get(3)?,
        proto: row.get(4)?,
        status_code: row.get(5)?,
        header: row.get(6)?,
        origin_encoding: row.get(7)?,
        storage_encoding: row.get(8)?,
        raw_size: row.get(9)?,
        body_size: row.get(10)?,
        body: row.get::<_, Option<Vec<u8>>>(11)?.unwrap_or_default(),
        content_type: row.get(12)?,
        content_hash: row.get(13)?,
        file_name: row.get(14)?,
    })
}

impl CacheDb {
    /// Get the record for `(method, url)`.
    ///
    /// Returns None if nothing is cached for the key.
    pub async fn get_response(&self, method: &str, url: &str) -> Result<Option<HttpResponseRecord>, Error> {
        let method = method.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Option<HttpResponseRecord>> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM http_responses WHERE method = ?1 AND url = ?2"
                ))?;

                match stmt.query_row(params![method, url], record_from_row) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(Error::StorageRead)
    }

    /// Insert a record, resolving a `(method, url)` collision per `conflict`.
    ///
    /// Returns whether a row was written. With [`Conflict::KeepExisting`] a
    /// collision writes nothing and returns false.
    pub async fn upsert_response(&self, record: HttpResponseRecord, conflict: Conflict) -> Result<bool, Error> {
        let now = Utc::now().to_rfc3339();
        let on_conflict = match conflict {
            Conflict::ReplaceAll => {
                "ON CONFLICT(method, url) DO UPDATE SET
                    host = excluded.host,
                    path = excluded.path,
                    proto = excluded.proto,
                    status_code = excluded.status_code,
                    header = excluded.header,
                    origin_encoding = excluded.origin_encoding,
                    storage_encoding = excluded.storage_encoding,
                    raw_size = excluded.raw_size,
                    body_size = excluded.body_size,
                    body = excluded.body,
                    content_type = excluded.content_type,
                    content_hash = excluded.content_hash,
                    file_name = excluded.file_name,
                    updated_at = excluded.updated_at"
            }
            Conflict::KeepExisting => "ON CONFLICT(method, url) DO NOTHING",
        };

        self.conn
            .call(move |conn| -> rusqlite::Result<bool> {
                let changed = conn.execute(
                    &format!(
                        "INSERT INTO http_responses ({RECORD_COLUMNS}, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
                         {on_conflict}"
                    ),
                    params![
                        &record.method,
                        &record.url,
                        &record.host,
                        &record.path,
                        &record.proto,
                        record.status_code,
                        &record.header,
                        &record.origin_encoding,
                        &record.storage_encoding,
                        record.raw_size,
                        record.body_size,
                        &record.body,
                        &record.content_type,
                        &record.content_hash,
                        &record.file_name,
                        &now,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await
            .map_err(Error::StorageWrite)
    }

    /// Delete the record for `(method, url)`. File content is never touched.
    ///
    /// Returns the number of rows removed.
    pub async fn delete_response(&self, method: &str, url: &str) -> Result<u64, Error> {
        let method = method.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM http_responses WHERE method = ?1 AND url = ?2", params![method, url])
            })
            .await
            .map(|n| n as u64)
            .map_err(Error::StorageWrite)
    }

    /// Most recently written records first, without bodies.
    pub async fn list_responses(&self, limit: usize) -> Result<Vec<ResponseSummary>, Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> rusqlite::Result<Vec<ResponseSummary>> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status_code, content_type, storage_encoding,
                            raw_size, body_size, content_hash, updated_at
                     FROM http_responses
                     ORDER BY updated_at DESC, id DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| {
                    Ok(ResponseSummary {
                        method: row.get(0)?,
                        url: row.get(1)?,
                        status_code: row.get(2)?,
                        content_type: row.get(3)?,
                        storage_encoding: row.get(4)?,
                        raw_size: row.get(5)?,
                        body_size: row.get(6)?,
                        content_hash: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(Error::StorageRead)
    }

    /// Number of cached records.
    pub async fn response_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM http_responses", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|n| n as u64)
            .map_err(Error::StorageRead)
    }
}
