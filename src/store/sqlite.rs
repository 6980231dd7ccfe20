//! `SQLite` subject record store.
//!
//! Persists per-subject field maps in a single table with a JSON column,
//! using read-modify-write semantics per update.

use crate::error::{Result, StoreError};
use crate::marker::FieldUpdate;
use crate::store::{FieldStore, merge_update};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Schema for the subjects table.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS subjects (
    subject_id TEXT PRIMARY KEY,
    fields     TEXT NOT NULL DEFAULT '{}',
    updated_at INTEGER NOT NULL DEFAULT 0
);
";

/// `SQLite`-based subject record store.
///
/// # Examples
///
/// ```no_run
/// use tagflow_rs::store::{FieldStore, SqliteStore};
///
/// let store = SqliteStore::open("tagflow-state.db").unwrap();
/// store.insert_subject("rec-1").unwrap();
/// ```
pub struct SqliteStore {
    /// Connection, serialized behind a mutex so the store is `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StoreError::from)?;

        // Use WAL mode for better concurrent access (returns result, use query_row)
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StoreError::from)?;

        conn.execute_batch(SCHEMA_SQL).map_err(StoreError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` store.
    ///
    /// Useful for testing and the replay CLI.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(StoreError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns current Unix timestamp.
    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl FieldStore for SqliteStore {
    fn insert_subject(&self, subject_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO subjects (subject_id, fields, updated_at) VALUES (?1, '{}', ?2)",
            params![subject_id, Self::now()],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    fn apply_update(&self, subject_id: &str, update: &FieldUpdate) -> Result<bool> {
        let conn = self.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT fields FROM subjects WHERE subject_id = ?1",
                params![subject_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;

        let Some(raw) = existing else {
            warn!(subject = subject_id, field = %update.field,
                "subject record not found, skipping update");
            return Ok(false);
        };

        let mut fields: Map<String, Value> =
            serde_json::from_str(&raw).map_err(StoreError::from)?;
        merge_update(&mut fields, update);
        let serialized = serde_json::to_string(&fields).map_err(StoreError::from)?;

        conn.execute(
            "UPDATE subjects SET fields = ?1, updated_at = ?2 WHERE subject_id = ?3",
            params![serialized, Self::now(), subject_id],
        )
        .map_err(StoreError::from)?;
        Ok(true)
    }

    fn get_fields(&self, subject_id: &str) -> Result<Option<Value>> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT fields FROM subjects WHERE subject_id = ?1",
                params![subject_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;

        raw.map(|r| serde_json::from_str(&r).map_err(|e| StoreError::from(e).into()))
            .transpose()
    }
}
