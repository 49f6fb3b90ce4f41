use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::services::dedup::SeenEntry;

/// SQLite-backed copy of the seen set, so a restart keeps suppressing
/// items delivered by the previous process. Times are stored in milliseconds.
pub struct SeenDatabase {
    conn: Mutex<Connection>,
}

impl SeenDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("seen store lock poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS seen_items (
                id TEXT PRIMARY KEY,
                first_seen_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_seen_expires ON seen_items(expires_at_ms);
            ",
        )?;
        Ok(())
    }

    /// Keeps the first-seen time of an existing row.
    pub fn insert(&self, id: &str, entry: &SeenEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO seen_items (id, first_seen_ms, expires_at_ms) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                id,
                entry.first_seen.timestamp_millis(),
                entry.expires_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    pub fn load_unexpired(&self, now: DateTime<Utc>) -> Result<Vec<(String, SeenEntry)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, first_seen_ms, expires_at_ms FROM seen_items WHERE expires_at_ms >= ?1 ORDER BY first_seen_ms ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![now.timestamp_millis()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, first_seen, expires_at) = row?;
            match (
                DateTime::from_timestamp_millis(first_seen),
                DateTime::from_timestamp_millis(expires_at),
            ) {
                (Some(first_seen), Some(expires_at)) => results.push((
                    id,
                    SeenEntry {
                        first_seen,
                        expires_at,
                    },
                )),
                _ => log::warn!("ignoring seen row {} with out-of-range timestamps", id),
            }
        }
        Ok(results)
    }

    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM seen_items WHERE expires_at_ms < ?1",
            rusqlite::params![now.timestamp_millis()],
        )?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn.query_row("SELECT COUNT(*) FROM seen_items", [], |row| row.get::<_, i64>(0))?;
        Ok(n as usize)
    }
}
