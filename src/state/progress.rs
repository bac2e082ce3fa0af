//! Progress state of a single crawl run
//!
//! A run owns three ordered id sequences: `processed` and `failed` are
//! append-only logs, `remaining` is a FIFO queue. An id appears in at most
//! one of them, and their union is always the seeded id set.

use crate::state::WorkStatus;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Errors raised when rebuilding a progress state from persisted parts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Work item '{id}' appears more than once across processed/remaining/failed")]
    DuplicateItem { id: String },
}

/// Progress of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    processed: Vec<String>,
    remaining: VecDeque<String>,
    failed: Vec<String>,
}

impl ProgressState {
    /// Creates a fresh state with every candidate id pending
    ///
    /// Repeated ids are collapsed, keeping the first occurrence, so the
    /// resulting queue never holds an id twice.
    pub fn seeded<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let mut remaining = VecDeque::new();
        for id in ids {
            if seen.insert(id.clone()) {
                remaining.push_back(id);
            } else {
                tracing::warn!("Ignoring duplicate candidate id {}", id);
            }
        }

        Self {
            processed: Vec::new(),
            remaining,
            failed: Vec::new(),
        }
    }

    /// Rebuilds a state from persisted sequences, rejecting overlaps
    pub fn from_parts(
        processed: Vec<String>,
        remaining: Vec<String>,
        failed: Vec<String>,
    ) -> Result<Self, StateError> {
        let mut seen = HashSet::new();
        for id in processed.iter().chain(remaining.iter()).chain(failed.iter()) {
            if !seen.insert(id.as_str()) {
                return Err(StateError::DuplicateItem { id: id.clone() });
            }
        }

        Ok(Self {
            processed,
            remaining: remaining.into(),
            failed,
        })
    }

    /// The next item to work on, without removing it
    pub fn peek(&self) -> Option<&str> {
        self.remaining.front().map(String::as_str)
    }

    /// Moves the head of `remaining` to `processed`
    pub fn mark_head_processed(&mut self) -> Option<String> {
        let id = self.remaining.pop_front()?;
        self.processed.push(id.clone());
        Some(id)
    }

    /// Moves the head of `remaining` to `failed`
    pub fn mark_head_failed(&mut self) -> Option<String> {
        let id = self.remaining.pop_front()?;
        self.failed.push(id.clone());
        Some(id)
    }

    pub fn processed(&self) -> &[String] {
        &self.processed
    }

    pub fn remaining(&self) -> &VecDeque<String> {
        &self.remaining
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Total number of ids tracked by this run
    pub fn total(&self) -> usize {
        self.processed.len() + self.remaining.len() + self.failed.len()
    }

    /// Iterates every tracked id with its status and position within its sequence
    pub fn entries(&self) -> impl Iterator<Item = (&str, WorkStatus, usize)> + '_ {
        let processed = self
            .processed
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), WorkStatus::Done, i));
        let remaining = self
            .remaining
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), WorkStatus::Pending, i));
        let failed = self
            .failed
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), WorkStatus::Failed, i));
        processed.chain(remaining).chain(failed)
    }
}
