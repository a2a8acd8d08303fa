//! SQLite handle for the partition store.
//!
//! Every connection runs in WAL mode with foreign keys on, so deleting a
//! partition cascades to its entries. Migrations run before the handle is
//! returned.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Persistent [`CacheStorage`](super::CacheStorage) backend.
///
/// Cloning shares the underlying connection thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the database file at `path`.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::info!(path = %path.display(), "opened cache database");
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await?;

        let applied = migrations::run(&conn).await?;
        if applied > 0 {
            tracing::debug!(applied, "cache schema migrated");
        }

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_is_migrated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let partitions: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM partitions", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(partitions, 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let enabled: i64 = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_partition_delete_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let remaining: i64 = db
            .conn
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO partitions (name, created_at) VALUES ('p', '2024-01-01T00:00:00Z');
                     INSERT INTO entries (partition, key_hash, method, url, status, content_type, headers_json, body, stored_at)
                     VALUES ('p', 'k', 'GET', 'https://site.test/', 200, NULL, '{}', x'', '2024-01-01T00:00:00Z');
                     DELETE FROM partitions WHERE name = 'p';",
                )?;
                conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
