//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Loading or seeding the progress state of a run
//! - Skipping work items whose record is already stored
//! - Fetching, normalizing and storing records
//! - Checkpointing progress every few items
//! - Handling interrupts and errors with a final checkpoint
//!
//! An item leaves `remaining` only after it has been classified, and no
//! await happens between storing its record and updating the progress
//! state. A kill at any point therefore loses at most the items handled
//! since the last checkpoint, and those are skipped on the next run.

use crate::config::Config;
use crate::crawler::fetcher::RecordSource;
use crate::crawler::retry::{fetch_with_retry, FetchOutcome, RetryPolicy};
use crate::seed::CandidateSource;
use crate::state::ProgressState;
use crate::storage::{load_progress, CrawlStorage, RunStatus, StorageError};
use crate::HarvestError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Randomized pause between two fetched items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    pub min: Duration,
    pub max: Duration,
}

impl PolitenessDelay {
    /// Draws a delay uniformly from `[min, max]` at millisecond resolution
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

/// Settings that drive one crawl run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub run_key: String,
    pub retry: RetryPolicy,
    pub politeness: PolitenessDelay,

    /// Items that may leave `remaining` between two checkpoints
    pub checkpoint_interval: u32,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_key: config.storage.run_key.clone(),
            retry: RetryPolicy::from_config(&config.crawler),
            politeness: PolitenessDelay {
                min: Duration::from_millis(config.crawler.politeness_min_ms),
                max: Duration::from_millis(config.crawler.politeness_max_ms),
            },
            checkpoint_interval: config.crawler.checkpoint_interval.max(1),
        }
    }
}

/// How a single work item was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A record for the item was already stored; nothing was fetched
    Skipped,
    Stored,
    /// Another writer stored the record between the existence check and insert
    DuplicateRace,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub item_id: String,
    pub disposition: Disposition,
}

/// Summary of a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub processed: usize,
    pub remaining: usize,
    pub failed: usize,

    /// Items handled by this invocation
    pub handled: usize,

    /// Whether the run stopped on an interrupt rather than an empty queue
    pub interrupted: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    settings: CrawlSettings,
    source: Box<dyn RecordSource>,
    storage: Box<dyn CrawlStorage>,
    progress: ProgressState,
    rng: StdRng,
    since_checkpoint: u32,
    handled: usize,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `settings` - Pacing, retry and checkpoint settings
    /// * `source` - Where records are fetched from
    /// * `storage` - Progress and output store
    /// * `candidates` - Ids used to seed the run if it has no stored progress
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Progress loaded or seeded and persisted
    /// * `Err(HarvestError)` - Failed to load, seed or persist progress
    pub fn new(
        settings: CrawlSettings,
        source: Box<dyn RecordSource>,
        mut storage: Box<dyn CrawlStorage>,
        candidates: &dyn CandidateSource,
    ) -> Result<Self, HarvestError> {
        let progress = load_progress(storage.as_mut(), &settings.run_key, candidates)?;

        Ok(Self {
            settings,
            source,
            storage,
            progress,
            rng: StdRng::from_entropy(),
            since_checkpoint: 0,
            handled: 0,
        })
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn storage(&self) -> &dyn CrawlStorage {
        self.storage.as_ref()
    }

    pub fn into_storage(self) -> Box<dyn CrawlStorage> {
        self.storage
    }

    /// Handles the head of `remaining`
    ///
    /// Returns `Ok(None)` once the queue is empty. The head is removed only
    /// after it has been classified.
    pub async fn process_next(&mut self) -> Result<Option<ItemReport>, HarvestError> {
        let item_id = match self.progress.peek() {
            Some(id) => id.to_string(),
            None => return Ok(None),
        };

        let disposition = if self.storage.exists(&item_id)? {
            tracing::debug!("Record for {} already stored, skipping", item_id);
            self.progress.mark_head_processed();
            Disposition::Skipped
        } else {
            let outcome =
                fetch_with_retry(self.source.as_ref(), &item_id, &self.settings.retry).await;

            match outcome {
                FetchOutcome::Success { record, attempts } => {
                    match self.storage.insert(&record) {
                        Ok(()) => {
                            tracing::debug!(
                                "Stored record {} for {} after {} attempt(s)",
                                record.id,
                                item_id,
                                attempts
                            );
                            self.progress.mark_head_processed();
                            Disposition::Stored
                        }
                        Err(StorageError::DuplicateKey { key }) => {
                            tracing::warn!(
                                "Record {} for {} was stored concurrently, keeping existing",
                                key,
                                item_id
                            );
                            self.progress.mark_head_processed();
                            Disposition::DuplicateRace
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                FetchOutcome::PermanentFailure { reason } => {
                    tracing::warn!("Marking {} as failed: {}", item_id, reason);
                    self.progress.mark_head_failed();
                    Disposition::Failed
                }
                FetchOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    tracing::warn!(
                        "Marking {} as failed after {} attempts: {}",
                        item_id,
                        attempts,
                        last_error
                    );
                    self.progress.mark_head_failed();
                    Disposition::Failed
                }
            }
        };

        self.since_checkpoint += 1;
        self.handled += 1;

        tracing::info!(
            "{} {:?} | processed: {}, remaining: {}, failed: {}",
            item_id,
            disposition,
            self.progress.processed().len(),
            self.progress.remaining().len(),
            self.progress.failed().len()
        );

        Ok(Some(ItemReport {
            item_id,
            disposition,
        }))
    }

    /// Saves progress once `checkpoint_interval` items have been handled
    pub fn maybe_checkpoint(&mut self) -> Result<bool, HarvestError> {
        if self.since_checkpoint < self.settings.checkpoint_interval {
            return Ok(false);
        }
        self.checkpoint()?;
        Ok(true)
    }

    /// Saves progress unconditionally
    pub fn checkpoint(&mut self) -> Result<(), HarvestError> {
        self.storage.save(&self.settings.run_key, &self.progress)?;
        self.since_checkpoint = 0;
        tracing::info!(
            "Checkpoint saved for run '{}' ({} processed, {} remaining, {} failed)",
            self.settings.run_key,
            self.progress.processed().len(),
            self.progress.remaining().len(),
            self.progress.failed().len()
        );
        Ok(())
    }

    /// Runs until the queue is empty or `shutdown` completes
    ///
    /// Progress is always saved before returning, whether the run
    /// completed, was interrupted or hit an error. The run status is set to
    /// match.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlReport, HarvestError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Starting run '{}': {} items remaining",
            self.settings.run_key,
            self.progress.remaining().len()
        );
        self.storage
            .set_run_status(&self.settings.run_key, RunStatus::Running)?;

        tokio::pin!(shutdown);
        let result = self.drive(shutdown.as_mut()).await;

        let status = match &result {
            Ok(false) => RunStatus::Completed,
            Ok(true) => RunStatus::Interrupted,
            Err(_) => RunStatus::Failed,
        };
        let saved = self.checkpoint().and_then(|_| {
            self.storage
                .set_run_status(&self.settings.run_key, status)
                .map_err(HarvestError::from)
        });

        let interrupted = match (result, saved) {
            (Ok(interrupted), Ok(())) => interrupted,
            (Ok(_), Err(save_error)) => return Err(save_error),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(save_error)) => {
                tracing::error!("Final checkpoint failed: {}", save_error);
                return Err(e);
            }
        };

        let report = CrawlReport {
            processed: self.progress.processed().len(),
            remaining: self.progress.remaining().len(),
            failed: self.progress.failed().len(),
            handled: self.handled,
            interrupted,
        };

        if interrupted {
            tracing::info!(
                "Run '{}' interrupted after {} items; {} remaining",
                self.settings.run_key,
                report.handled,
                report.remaining
            );
        } else {
            tracing::info!(
                "Run '{}' completed: {} processed, {} failed",
                self.settings.run_key,
                report.processed,
                report.failed
            );
        }

        Ok(report)
    }

    /// Runs until the queue is empty or the process receives Ctrl-C/SIGTERM
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        self.run_until(shutdown_signal()).await
    }

    /// The loop proper; returns whether it stopped on `shutdown`
    async fn drive<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<bool, HarvestError>
    where
        F: Future<Output = ()>,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    tracing::info!("Interrupt received, stopping");
                    return Ok(true);
                }
                next = self.process_next() => next?,
            };

            let report = match next {
                Some(report) => report,
                None => return Ok(false),
            };

            self.maybe_checkpoint()?;

            if report.disposition == Disposition::Skipped || self.progress.is_finished() {
                continue;
            }

            let delay = self.settings.politeness.sample(&mut self.rng);
            tracing::debug!("Waiting {:?} before the next item", delay);
            tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    tracing::info!("Interrupt received, stopping");
                    return Ok(true);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Completes on Ctrl-C, or on SIGTERM where available
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
