//! SQLite implementation of [`CacheStorage`].
//!
//! Partitions live in the `partitions` table; entries reference them with
//! `ON DELETE CASCADE`, so dropping a partition drops its entries in the
//! same statement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row, types::Type};

use super::connection::CacheDb;
use super::entry::CachedResponse;
use super::hash::compute_cache_key;
use super::storage::{CacheStorage, ensure_storable};
use crate::Error;

const ENTRY_COLUMNS: &str =
    "e.method, e.url, e.status, e.content_type, e.headers_json, e.body, e.stored_at";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CachedResponse> {
    let headers_json: String = row.get(4)?;
    let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(CachedResponse {
        method: row.get(0)?,
        url: row.get(1)?,
        status: row.get(2)?,
        content_type: row.get(3)?,
        headers,
        body: row.get(5)?,
        stored_at: row.get(6)?,
    })
}

fn headers_to_json(entry: &CachedResponse) -> Result<String, Error> {
    serde_json::to_string(&entry.headers).map_err(|e| Error::Storage(format!("failed to encode headers: {e}")))
}

fn insert_partition(conn: &rusqlite::Connection, partition: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![partition, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn upsert_entry(
    conn: &rusqlite::Connection, partition: &str, entry: &CachedResponse, headers_json: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entries (
            partition, key_hash, method, url, status, content_type, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            entry.key_hash(),
            entry.method.to_ascii_uppercase(),
            &entry.url,
            entry.status,
            &entry.content_type,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                insert_partition(conn, &partition)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, partition: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let partition = partition.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.partition = ?1 AND e.key_hash = ?2"
                ))?;

                match stmt.query_row(params![partition, key_hash], row_to_entry) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, partition: &str, entry: &CachedResponse) -> Result<(), Error> {
        ensure_storable(entry)?;
        let headers_json = headers_to_json(entry)?;
        let partition = partition.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                insert_partition(&tx, &partition)?;
                upsert_entry(&tx, &partition, &entry, &headers_json)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, partition: &str, entries: &[CachedResponse]) -> Result<(), Error> {
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            ensure_storable(entry)?;
            rows.push((entry.clone(), headers_to_json(entry)?));
        }

        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                insert_partition(&tx, &partition)?;
                for (entry, headers_json) in &rows {
                    upsert_entry(&tx, &partition, entry, headers_json)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, partition: &str, method: &str, url: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid")?;
                let urls = stmt
                    .query_map(params![partition], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                    JOIN partitions p ON p.name = e.partition
                    WHERE e.key_hash = ?1
                    ORDER BY p.rowid
                    LIMIT 1"
                ))?;

                match stmt.query_row(params![key_hash], row_to_entry) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn match_html(&self) -> Result<Option<CachedResponse>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                    JOIN partitions p ON p.name = e.partition
                    WHERE e.content_type LIKE '%text/html%'
                    ORDER BY p.rowid, e.rowid
                    LIMIT 1"
                ))?;

                match stmt.query_row([], row_to_entry) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
