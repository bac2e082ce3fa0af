//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the progress and
//! output store traits. A checkpoint is a single transaction, so the three
//! progress sequences are always replaced together.

use crate::crawler::CanonicalRecord;
use crate::state::{ProgressState, WorkStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{OutputStore, ProgressStore, StorageError, StorageResult};
use crate::storage::RunStatus;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Checkpoints must survive a process kill right after commit
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl ProgressStore for SqliteStorage {
    fn read_progress(&self, run_key: &str) -> StorageResult<Option<ProgressState>> {
        let known: Option<String> = self
            .conn
            .query_row(
                "SELECT run_key FROM runs WHERE run_key = ?1",
                params![run_key],
                |row| row.get(0),
            )
            .optional()?;

        if known.is_none() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT item_id, status FROM work_items WHERE run_key = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt
            .query_map(params![run_key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut processed = Vec::new();
        let mut remaining = Vec::new();
        let mut failed = Vec::new();

        for (item_id, status) in rows {
            match WorkStatus::from_db_string(&status) {
                Some(WorkStatus::Done) => processed.push(item_id),
                Some(WorkStatus::Pending) => remaining.push(item_id),
                Some(WorkStatus::Failed) => failed.push(item_id),
                None => {
                    return Err(StorageError::Corrupt(format!(
                        "Unknown status '{}' for item {}",
                        status, item_id
                    )))
                }
            }
        }

        Ok(Some(ProgressState::from_parts(processed, remaining, failed)?))
    }

    fn save(&mut self, run_key: &str, state: &ProgressState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (run_key, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(run_key) DO UPDATE SET updated_at = excluded.updated_at",
            params![run_key, RunStatus::Running.to_db_string(), now],
        )?;

        tx.execute(
            "DELETE FROM work_items WHERE run_key = ?1",
            params![run_key],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO work_items (run_key, item_id, status, position) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (item_id, status, position) in state.entries() {
                stmt.execute(params![
                    run_key,
                    item_id,
                    status.to_db_string(),
                    position as i64
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn set_run_status(&mut self, run_key: &str, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, updated_at = ?2 WHERE run_key = ?3",
            params![status.to_db_string(), now, run_key],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_key.to_string()));
        }
        Ok(())
    }

    fn run_status(&self, run_key: &str) -> StorageResult<Option<RunStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM runs WHERE run_key = ?1",
                params![run_key],
                |row| row.get(0),
            )
            .optional()?;

        match status {
            Some(s) => RunStatus::from_db_string(&s)
                .map(Some)
                .ok_or_else(|| StorageError::Corrupt(format!("Unknown run status '{}'", s))),
            None => Ok(None),
        }
    }
}

impl OutputStore for SqliteStorage {
    fn exists(&self, item_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE item_id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&mut self, record: &CanonicalRecord) -> StorageResult<()> {
        let document = serde_json::to_string(record)?;
        let result = self.conn.execute(
            "INSERT INTO records (id, item_id, document, scraped_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.key(),
                record.slug,
                document,
                record.scraped_at.to_rfc3339()
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateKey {
                    key: record.id.key(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, item_id: &str) -> StorageResult<Option<CanonicalRecord>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM records WHERE item_id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
