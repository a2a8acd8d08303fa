//! Schema migrations for the partition store.
//!
//! Applied versions are recorded in `_migrations`; each pending step runs in
//! its own transaction together with its bookkeeping row.

use super::Error;
use tokio_rusqlite::{Connection, params};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version; versions are never reused.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "partitions", sql: include_str!("../../migrations/001_partitions.sql") },
    Migration {
        version: 2,
        name: "entries_content_type",
        sql: include_str!("../../migrations/002_entries_content_type.sql"),
    },
];

/// Bring the schema up to date. Returns how many migrations were applied.
pub async fn run(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| -> Result<usize, Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        let mut applied = 0;
        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;

            tracing::debug!(version = migration.version, name = migration.name, "applied cache migration");
            applied += 1;
        }

        Ok(applied)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_database_applies_everything() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), MIGRATIONS.len());

        let tables: Vec<String> = conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(names)
            })
            .await
            .unwrap();

        assert_eq!(tables, vec!["_migrations", "entries", "partitions"]);
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), 0);

        let recorded: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM _migrations ORDER BY version")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(names)
            })
            .await
            .unwrap();

        assert_eq!(recorded, vec!["partitions", "entries_content_type"]);
    }

    #[test]
    fn test_versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }
}
