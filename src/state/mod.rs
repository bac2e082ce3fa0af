//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `WorkStatus`: where a single work item stands (pending, done, failed)
//! - `ProgressState`: the three ordered id sequences of a run, with the
//!   disjointness invariant enforced on every transition

mod progress;
mod work_status;

// Re-export main types
pub use progress::{ProgressState, StateError};
pub use work_status::WorkStatus;
