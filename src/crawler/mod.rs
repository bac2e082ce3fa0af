//! Crawler module for record fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of primary and auxiliary records
//! - Normalization into canonical records
//! - Per-item retry control
//! - Overall crawl coordination and checkpointing

mod coordinator;
mod fetcher;
mod normalize;
mod retry;


pub use coordinator::{
    shutdown_signal, Coordinator, CrawlReport, CrawlSettings, Disposition, ItemReport,
    PolitenessDelay,
};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, RecordSource};
pub use normalize::{
    compute_age, normalize, parse_birth_date, CanonicalRecord, PrimaryRecord, RecordId,
    ShapeError,
};
pub use retry::{fetch_with_retry, FetchOutcome, RetryPolicy};

use crate::config::Config;
use crate::seed::JsonFileCandidates;
use crate::storage::open_storage;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the configured storage backend
/// 2. Load the run's progress, seeding it from the candidates file on first use
/// 3. Build the HTTP fetcher
/// 4. Work through the queue until it is empty or the process is interrupted
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The run finished or was interrupted after a final checkpoint
/// * `Err(HarvestError)` - Crawl failed
///
/// # Example
///
/// ```no_run
/// use slug_harvester::config::load_config;
/// use slug_harvester::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} failed", report.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    let storage = open_storage(&config.storage)?;
    let source = HttpFetcher::from_config(&config)?;
    let candidates = JsonFileCandidates::new(&config.input.candidates_path, &config.input.id_field);

    let mut coordinator = Coordinator::new(
        CrawlSettings::from_config(&config),
        Box::new(source),
        storage,
        &candidates,
    )?;

    coordinator.run().await
}
