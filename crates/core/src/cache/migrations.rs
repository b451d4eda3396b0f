//! Database schema migrations.
//!
//! Migrations are tracked by name in a `_migrations` table. Each belongs to
//! a [`Schema`], so a host database only gets the response tables, the
//! shared file database only gets the file tables, and an in-memory
//! database gets both.

use chrono::Utc;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// Which group of tables a storage handle carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `http_responses`, one database per host.
    Responses,
    /// `file_contents` and `file_refs`, shared across hosts.
    Files,
    /// Everything in one database.
    All,
}

impl Schema {
    fn includes(self, other: Schema) -> bool {
        self == Schema::All || self == other
    }
}

/// Migration list: (schema, name, SQL).
///
/// Applied in order. Names are never reused; the SQL is idempotent
/// (`CREATE ... IF NOT EXISTS`).
const MIGRATIONS: &[(Schema, &str, &str)] = &[
    (Schema::Responses, "001_http_responses", include_str!("../../migrations/001_http_responses.sql")),
    (Schema::Files, "002_file_store", include_str!("../../migrations/002_file_store.sql")),
];

/// Apply every pending migration that belongs to `schema`.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` if a migration fails to execute. A
/// failed migration leaves no `_migrations` row behind.
pub async fn run(conn: &Connection, schema: Schema) -> Result<(), Error> {
    conn.call(move |conn| -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        for &(target, name, sql) in MIGRATIONS {
            if !schema.includes(target) {
                continue;
            }

            let applied: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )?;
            if applied {
                continue;
            }

            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO _migrations (name, applied_at) VALUES (?1, ?2)",
                params![name, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(migration = name, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(|e| Error::MigrationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, table: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                params![table],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn, Schema::All).await.unwrap();
        run(&conn, Schema::All).await.unwrap();

        assert!(table_exists(&conn, "http_responses").await);
        assert!(table_exists(&conn, "file_contents").await);
        assert!(table_exists(&conn, "file_refs").await);
    }

    #[tokio::test]
    async fn test_schema_selects_tables() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn, Schema::Files).await.unwrap();

        assert!(!table_exists(&conn, "http_responses").await);
        assert!(table_exists(&conn, "file_contents").await);

        run(&conn, Schema::Responses).await.unwrap();
        assert!(table_exists(&conn, "http_responses").await);
    }

    #[tokio::test]
    async fn test_migrations_tracked_by_name() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn, Schema::All).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }
}
