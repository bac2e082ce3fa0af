//! Per-item retry controller
//!
//! One work item goes through: primary fetch, shape check, auxiliary fetch,
//! normalization. Only the primary fetch is retried, with a fixed delay in
//! between. A shape problem ends the item at once.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, RecordSource};
use crate::crawler::normalize::{CanonicalRecord, PrimaryRecord, ShapeError};
use chrono::Utc;
use std::time::Duration;

/// Attempt budget and spacing for primary fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Pause after each failed attempt that is followed by another
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Terminal classification of one work item
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        record: CanonicalRecord,
        attempts: u32,
    },

    /// The record exists but cannot be normalized
    PermanentFailure { reason: ShapeError },

    /// Every attempt failed with a transient error
    Exhausted {
        attempts: u32,
        last_error: FetchError,
    },
}

/// Fetches and normalizes one work item, retrying transient failures
///
/// Transport errors never escape: they are folded into
/// `FetchOutcome::Exhausted` once the attempt budget runs out.
pub async fn fetch_with_retry(
    source: &dyn RecordSource,
    item_id: &str,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    let body = loop {
        attempt += 1;
        match source.fetch_primary(item_id).await {
            Ok(body) => break body,
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    item_id,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}; giving up",
                    attempt,
                    max_attempts,
                    item_id,
                    e
                );
                return FetchOutcome::Exhausted {
                    attempts: attempt,
                    last_error: e,
                };
            }
        }
    };

    let primary = match PrimaryRecord::from_body(body) {
        Ok(primary) => primary,
        Err(reason) => {
            tracing::warn!("Record for {} is unusable: {}", item_id, reason);
            return FetchOutcome::PermanentFailure { reason };
        }
    };

    let services = source.fetch_auxiliary(&primary.id().key()).await;
    let record = primary.into_canonical(item_id, services, Utc::now());

    FetchOutcome::Success {
        record,
        attempts: attempt,
    }
}
