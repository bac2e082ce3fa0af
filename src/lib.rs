//! Slug-Harvester: a resumable record crawler
//!
//! This crate walks a fixed list of identifiers, fetches a primary record and
//! its auxiliary sub-records for each one from a remote HTTP API, normalizes
//! them, and persists the result while checkpointing progress so that an
//! interrupted run can be resumed without losing or duplicating work.

pub mod config;
pub mod crawler;
pub mod output;
pub mod seed;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Slug-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Candidate source error: {0}")]
    Seed(#[from] seed::SeedError),

    #[error("No candidate ids available to seed run '{run_key}'")]
    NoCandidates { run_key: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Slug-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CanonicalRecord, Coordinator, CrawlReport};
pub use state::{ProgressState, WorkStatus};
pub use storage::{CrawlStorage, OutputStore, ProgressStore, RunStatus};
