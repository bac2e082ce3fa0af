//! Storage traits and error types
//!
//! This module defines the trait interfaces for the progress and output
//! stores and their shared error type.

use crate::crawler::CanonicalRecord;
use crate::state::{ProgressState, StateError};
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid progress state: {0}")]
    InvalidState(#[from] StateError),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable progress state, keyed by run
pub trait ProgressStore {
    /// Reads the persisted state of a run, if any
    fn read_progress(&self, run_key: &str) -> StorageResult<Option<ProgressState>>;

    /// Replaces the persisted state of a run
    ///
    /// The three sequences are written together or not at all.
    fn save(&mut self, run_key: &str, state: &ProgressState) -> StorageResult<()>;

    /// Records the lifecycle status of an existing run
    fn set_run_status(&mut self, run_key: &str, status: RunStatus) -> StorageResult<()>;

    /// Gets the lifecycle status of a run
    fn run_status(&self, run_key: &str) -> StorageResult<Option<RunStatus>>;
}

/// Durable destination for normalized records
pub trait OutputStore {
    /// Checks whether a record produced by this work item is already stored
    fn exists(&self, item_id: &str) -> StorageResult<bool>;

    /// Stores a record
    ///
    /// Fails with `StorageError::DuplicateKey` if a record with the same id
    /// or produced by the same work item is already present.
    fn insert(&mut self, record: &CanonicalRecord) -> StorageResult<()>;

    /// Gets the record produced by a work item
    fn get(&self, item_id: &str) -> StorageResult<Option<CanonicalRecord>>;

    /// Counts stored records
    fn count(&self) -> StorageResult<u64>;
}

/// A backend holding both progress and records
pub trait CrawlStorage: ProgressStore + OutputStore + Send {}

impl<T> CrawlStorage for T where T: ProgressStore + OutputStore + Send {}
