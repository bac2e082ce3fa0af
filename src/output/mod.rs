//! Output module for crawl reports
//!
//! This module handles:
//! - Querying the progress of a run from storage
//! - Printing run statistics, including every failed id

pub mod stats;

pub use stats::{load_statistics, print_statistics, ProgressStatistics};
