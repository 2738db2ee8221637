// ABOUTME: SQLite-backed key/value backend used as the local persistent store.
// ABOUTME: One WAL-mode table of string keys to serialized values.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::engine::{StorageBackend, StorageError};

/// A persistent key/value store in a single sqlite file. The connection is
/// guarded by a mutex; callers never hold it across an await point.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the store at the given path.
    /// Creates parent directories if they do not exist.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl StorageBackend for SqliteStorage {
    fn length(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.conn()?.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.db");

        {
            let store = SqliteStorage::open(&path).unwrap();
            store.set_item("counter", r#"{"count":3}"#).unwrap();
        }

        let store = SqliteStorage::open(&path).unwrap();
        assert_eq!(
            store.get_item("counter").unwrap().as_deref(),
            Some(r#"{"count":3}"#)
        );
        assert_eq!(store.length().unwrap(), 1);
    }

    #[test]
    fn upsert_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStorage::open(&dir.path().join("local.db")).unwrap();

        store.set_item("a", "1").unwrap();
        store.set_item("a", "2").unwrap();
        store.set_item("b", "3").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("2"));
        assert_eq!(store.length().unwrap(), 2);

        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a").unwrap(), None);

        store.clear().unwrap();
        assert_eq!(store.length().unwrap(), 0);
    }
}
