//! Statistics generation from crawl storage
//!
//! This module provides functionality for extracting and displaying the
//! progress of a run from the storage layer. Failed ids stay listed here
//! long after the run that failed them.

use crate::storage::{CrawlStorage, RunStatus, StorageError};
use crate::HarvestError;

/// Progress statistics of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStatistics {
    pub run_key: String,

    /// Lifecycle status, if one was ever recorded
    pub status: Option<RunStatus>,

    pub processed: usize,
    pub remaining: usize,
    pub failed: usize,

    /// Failed ids in the order they failed
    pub failed_ids: Vec<String>,

    /// Records in the output store, across every run sharing it
    pub stored_records: u64,
}

impl ProgressStatistics {
    pub fn total(&self) -> usize {
        self.processed + self.remaining + self.failed
    }

    /// Share of items that have left the queue, in percent
    pub fn completion(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.processed + self.failed) as f64 / total as f64 * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run_key` - The run to report on
///
/// # Returns
///
/// * `Ok(ProgressStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - The run is unknown or the store could not be read
pub fn load_statistics<S>(storage: &S, run_key: &str) -> Result<ProgressStatistics, HarvestError>
where
    S: CrawlStorage + ?Sized,
{
    let progress = storage
        .read_progress(run_key)?
        .ok_or_else(|| StorageError::RunNotFound(run_key.to_string()))?;

    Ok(ProgressStatistics {
        run_key: run_key.to_string(),
        status: storage.run_status(run_key)?,
        processed: progress.processed().len(),
        remaining: progress.remaining().len(),
        failed: progress.failed().len(),
        failed_ids: progress.failed().to_vec(),
        stored_records: storage.count()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ProgressStatistics) {
    println!("=== Run Statistics: {} ===\n", stats.run_key);

    let status = stats
        .status
        .map(|s| s.to_db_string())
        .unwrap_or("unknown");
    println!("Status: {}", status);
    println!();

    println!("Progress:");
    println!("  Processed: {}", stats.processed);
    println!("  Remaining: {}", stats.remaining);
    println!("  Failed:    {}", stats.failed);
    println!(
        "  Completion: {:.1}% ({} / {})",
        stats.completion(),
        stats.processed + stats.failed,
        stats.total()
    );
    println!();

    println!("Stored records: {}", stats.stored_records);

    if !stats.failed_ids.is_empty() {
        println!();
        println!("Failed Ids ({}):", stats.failed_ids.len());
        for id in &stats.failed_ids {
            println!("  - {}", id);
        }
    }
}
