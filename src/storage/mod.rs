//! Storage module for persisting crawl progress and records
//!
//! This module handles all persistence for the crawler, including:
//! - Progress state per run key (processed / remaining / failed)
//! - Run status tracking for resumption and reporting
//! - The output store of normalized records, keyed by a stable id
//!
//! Two interchangeable backends implement the same traits: a single SQLite
//! database, or a JSON state file plus a JSON-Lines record file.

mod file;
mod schema;
mod sqlite;
mod traits;

pub use file::FileStorage;
pub use sqlite::SqliteStorage;
pub use traits::{CrawlStorage, OutputStore, ProgressStore, StorageError, StorageResult};

use crate::config::{StorageBackend, StorageConfig};
use crate::seed::CandidateSource;
use crate::state::ProgressState;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opens the backend selected by the configuration
///
/// # Arguments
///
/// * `config` - The storage section of the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn CrawlStorage>)` - An open store ready for progress and records
/// * `Err(StorageError)` - Failed to open or recover the backend
pub fn open_storage(config: &StorageConfig) -> Result<Box<dyn CrawlStorage>, StorageError> {
    match config.backend {
        StorageBackend::Sqlite => {
            let path = required_path(&config.database_path, "database_path")?;
            Ok(Box::new(SqliteStorage::new(Path::new(path))?))
        }
        StorageBackend::File => {
            let state = required_path(&config.state_path, "state_path")?;
            let output = required_path(&config.output_path, "output_path")?;
            Ok(Box::new(FileStorage::open(Path::new(state), Path::new(output))?))
        }
    }
}

fn required_path<'a>(path: &'a Option<String>, name: &str) -> Result<&'a str, StorageError> {
    path.as_deref()
        .ok_or_else(|| StorageError::Corrupt(format!("{} is not configured", name)))
}

/// Loads the progress of a run, seeding and persisting it on first use
///
/// If the store has no state for `run_key`, the candidate source is read,
/// the resulting state is saved immediately, and returned. An empty
/// candidate list is fatal.
pub fn load_progress<S>(
    store: &mut S,
    run_key: &str,
    candidates: &dyn CandidateSource,
) -> Result<ProgressState, HarvestError>
where
    S: ProgressStore + ?Sized,
{
    if let Some(state) = store.read_progress(run_key)? {
        tracing::info!(
            "Resuming run '{}': {} processed, {} remaining, {} failed",
            run_key,
            state.processed().len(),
            state.remaining().len(),
            state.failed().len()
        );
        return Ok(state);
    }

    let ids = candidates.candidate_ids()?;
    if ids.is_empty() {
        return Err(HarvestError::NoCandidates {
            run_key: run_key.to_string(),
        });
    }

    let state = ProgressState::seeded(ids);
    store.save(run_key, &state)?;
    tracing::info!(
        "Seeded run '{}' with {} candidate ids",
        run_key,
        state.remaining().len()
    );

    Ok(state)
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
