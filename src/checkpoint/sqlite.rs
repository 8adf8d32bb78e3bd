//! SQLite checkpoint backend.
//!
//! Calls are synchronous and run on the caller's runtime thread.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{validate_id, CheckpointError, CheckpointStore};

pub struct SqliteCheckpointStore {
    path: PathBuf,
    conn: Mutex<Connection>,
    count: usize,
}

impl SqliteCheckpointStore {
    /// Open the database at `path`, creating the table if needed
    pub fn open(path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS processed (
                 id          TEXT PRIMARY KEY,
                 recorded_at TEXT NOT NULL
             );",
        )?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM processed", [], |row| row.get(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            count: count as usize,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every recorded ID from an existing database, opened read-only
    pub fn read_ids(path: &Path) -> Result<HashSet<String>, CheckpointError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let has_table = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'processed'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !has_table {
            return Ok(HashSet::new());
        }

        let mut stmt = conn.prepare("SELECT id FROM processed")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn lookup(&self, id: &str) -> Result<bool, CheckpointError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let found = conn
            .query_row("SELECT 1 FROM processed WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn contains(&self, id: &str) -> bool {
        match self.lookup(id) {
            Ok(found) => found,
            Err(e) => {
                // Unreadable means handled: never risk a duplicate record.
                tracing::error!(conversation_id = id, error = %e, "Checkpoint lookup failed");
                true
            }
        }
    }

    async fn record(&mut self, id: &str) -> Result<(), CheckpointError> {
        validate_id(id)?;

        let inserted = {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT OR IGNORE INTO processed (id, recorded_at) VALUES (?1, ?2)",
                params![id, Utc::now().to_rfc3339()],
            )?
        };

        self.count += inserted;
        Ok(())
    }

    fn len(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_and_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.db");

        let mut store = SqliteCheckpointStore::open(&path).unwrap();
        assert!(store.is_empty());

        store.record("conv_1").await.unwrap();
        store.record("conv_1").await.unwrap();
        assert!(store.contains("conv_1"));
        assert!(!store.contains("conv_2"));
        assert_eq!(store.len(), 1);

        drop(store);
        let reopened = SqliteCheckpointStore::open(&path).unwrap();
        assert!(reopened.contains("conv_1"));
        assert_eq!(reopened.len(), 1);
    }
}
