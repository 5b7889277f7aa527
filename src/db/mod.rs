//! SQLite persistence for price history and warm-start snapshots

use crate::error::{SyncError, SyncResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod price_history;
pub mod state_cache;

pub use price_history::{HistoryWriter, PriceHistory, PricePoint};
pub use state_cache::StateCache;

/// Shared handle to one SQLite connection
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file, creating parent directories
    pub fn new<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SyncError::StorageConnection(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| SyncError::StorageConnection(format!("{}: {}", path.display(), e)))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::StorageConnection(e.to_string()))?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create tables if they do not exist yet
    pub fn run_migrations(&self) -> SyncResult<()> {
        let conn = self.lock()?;
        let migration_sql = include_str!("migrations/V1__price_history.sql");
        conn.execute_batch(migration_sql)?;
        Ok(())
    }

    /// Open a file database and make sure the schema is in place
    pub fn open_and_migrate<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let db = Self::new(path)?;
        db.run_migrations()?;
        Ok(db)
    }

    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn health_check(&self) -> SyncResult<bool> {
        let conn = self.lock()?;
        let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(result == 1)
    }

    pub(crate) fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::StorageConnection("database mutex poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.health_check().unwrap());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        db.run_migrations().unwrap();

        let conn = db.lock().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('price_history', 'state_cache')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
