//! Content-addressed file store.
//!
//! A body is stored once per content hash in `file_contents`; each URL that
//! served it gets a row in `file_refs`. Content is write-once: a second put
//! with a known hash leaves the stored bytes untouched.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use crate::Error;

/// Derives the stored extension from a display name and the raw bytes.
pub type DetectExt = Arc<dyn Fn(&str, &[u8]) -> String + Send + Sync>;

/// Default extension policy: the lowercased extension of `name`, without dot.
pub fn ext_from_name(name: &str, _content: &[u8]) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// One distinct file body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Hex SHA-256 of the raw bytes.
    pub hash: String,
    pub name: String,
    /// Raw (uncompressed) size in bytes.
    pub size: i64,
    pub ext: String,
    pub content_type: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// A URL's claim on a [`FileContent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub hash: String,
    pub url: String,
    pub name: String,
}

impl CacheDb {
    /// Store a file body and record `file_ref` against it.
    ///
    /// The content row is inserted only if its hash is new. The ref is
    /// upserted on `(hash, url)`, and any ref the same URL holds on a
    /// different hash is dropped. Returns whether the content was new.
    pub async fn put_file(&self, content: FileContent, file_ref: FileRef) -> Result<bool, Error> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> rusqlite::Result<bool> {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    "INSERT INTO file_contents (hash, name, size, ext, content_type, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(hash) DO NOTHING",
                    params![
                        &content.hash,
                        &content.name,
                        content.size,
                        &content.ext,
                        &content.content_type,
                        &content.content,
                        &now,
                    ],
                )?;
                tx.execute(
                    "DELETE FROM file_refs WHERE url = ?1 AND hash <> ?2",
                    params![&file_ref.url, &file_ref.hash],
                )?;
                tx.execute(
                    "INSERT INTO file_refs (hash, url, name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(hash, url) DO UPDATE SET
                        name = excluded.name,
                        updated_at = excluded.updated_at",
                    params![&file_ref.hash, &file_ref.url, &file_ref.name, &now],
                )?;
                tx.commit()?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::StorageWrite)
    }

    /// Get a file body by hash.
    ///
    /// Returns None if the hash doesn't exist in the store.
    pub async fn get_file(&self, hash: &str) -> Result<Option<FileContent>, Error> {
        let hash = hash.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Option<FileContent>> {
                let result = conn.query_row(
                    "SELECT hash, name, size, ext, content_type, content FROM file_contents WHERE hash = ?1",
                    params![hash],
                    |row| {
                        Ok(FileContent {
                            hash: row.get(0)?,
                            name: row.get(1)?,
                            size: row.get(2)?,
                            ext: row.get(3)?,
                            content_type: row.get(4)?,
                            content: row.get(5)?,
                        })
                    },
                );

                match result {
                    Ok(file) => Ok(Some(file)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(Error::StorageRead)
    }

    /// All URLs referencing `hash`, oldest first.
    pub async fn file_refs(&self, hash: &str) -> Result<Vec<FileRef>, Error> {
        let hash = hash.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Vec<FileRef>> {
                let mut stmt = conn.prepare("SELECT hash, url, name FROM file_refs WHERE hash = ?1 ORDER BY id")?;
                let rows = stmt.query_map(params![hash], |row| {
                    Ok(FileRef { hash: row.get(0)?, url: row.get(1)?, name: row.get(2)? })
                })?;
                rows.collect()
            })
            .await
            .map_err(Error::StorageRead)
    }

    /// The ref a URL currently holds, if any.
    pub async fn file_ref_for_url(&self, url: &str) -> Result<Option<FileRef>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<Option<FileRef>> {
                let result = conn.query_row(
                    "SELECT hash, url, name FROM file_refs WHERE url = ?1 ORDER BY updated_at DESC LIMIT 1",
                    params![url],
                    |row| Ok(FileRef { hash: row.get(0)?, url: row.get(1)?, name: row.get(2)? }),
                );

                match result {
                    Ok(file_ref) => Ok(Some(file_ref)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(Error::StorageRead)
    }

    /// Number of distinct file bodies.
    pub async fn file_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM file_contents", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|n| n as u64)
            .map_err(Error::StorageRead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::content_hash;

    fn make_file(body: &[u8], name: &str) -> FileContent {
        FileContent {
            hash: content_hash(body),
            name: name.to_string(),
            size: body.len() as i64,
            ext: ext_from_name(name, body),
            content_type: "application/pdf".to_string(),
            content: body.to_vec(),
        }
    }

    fn make_ref(file: &FileContent, url: &str) -> FileRef {
        FileRef { hash: file.hash.clone(), url: url.to_string(), name: file.name.clone() }
    }

    #[test]
    fn test_ext_from_name() {
        assert_eq!(ext_from_name("report.PDF", b""), "pdf");
        assert_eq!(ext_from_name("archive.tar.gz", b""), "gz");
        assert_eq!(ext_from_name("README", b""), "");
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let file = make_file(b"%PDF-1.7 body", "report.pdf");

        assert!(db.put_file(file.clone(), make_ref(&file, "https://a.test/r.pdf")).await.unwrap());

        let stored = db.get_file(&file.hash).await.unwrap().unwrap();
        assert_eq!(stored, file);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_file("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = make_file(b"same bytes", "first.bin");
        let mut second = make_file(b"same bytes", "second.bin");
        second.content_type = "text/plain".into();

        assert!(db.put_file(first.clone(), make_ref(&first, "https://a.test/1")).await.unwrap());
        assert!(!db.put_file(second.clone(), make_ref(&second, "https://b.test/2")).await.unwrap());

        let stored = db.get_file(&first.hash).await.unwrap().unwrap();
        assert_eq!(stored.name, "first.bin");
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(db.file_count().await.unwrap(), 1);
        assert_eq!(db.file_refs(&first.hash).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_ref_is_upserted() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let file = make_file(b"payload", "a.bin");
        let url = "https://a.test/a.bin";

        db.put_file(file.clone(), make_ref(&file, url)).await.unwrap();
        let mut renamed = make_ref(&file, url);
        renamed.name = "renamed.bin".into();
        db.put_file(file.clone(), renamed).await.unwrap();

        let refs = db.file_refs(&file.hash).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "renamed.bin");
    }

    #[tokio::test]
    async fn test_url_moves_to_new_hash() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://a.test/latest.zip";
        let v1 = make_file(b"version one", "latest.zip");
        let v2 = make_file(b"version two", "latest.zip");

        db.put_file(v1.clone(), make_ref(&v1, url)).await.unwrap();
        db.put_file(v2.clone(), make_ref(&v2, url)).await.unwrap();

        assert!(db.file_refs(&v1.hash).await.unwrap().is_empty());
        assert_eq!(db.file_ref_for_url(url).await.unwrap().unwrap().hash, v2.hash);
        // Old content stays; only the ref moved.
        assert!(db.get_file(&v1.hash).await.unwrap().is_some());
    }
}
