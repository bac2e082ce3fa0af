//! Configuration module for Slug-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use slug_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Retry budget: {} attempts", config.crawler.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, CrawlerConfig, InputConfig, StorageBackend, StorageConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
