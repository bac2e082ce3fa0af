//! Candidate id sources used to seed a new run
//!
//! A source is read once, the first time a run key has no persisted
//! progress. Later runs resume from the stored state and never consult it.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading candidate ids
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read candidates from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse candidates in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Candidates in {path} must be a JSON array")]
    NotAnArray { path: PathBuf },

    #[error("Candidate #{index} has no string field '{field}'")]
    MissingField { index: usize, field: String },
}

/// Something that can enumerate the ids a fresh run should work through
pub trait CandidateSource {
    fn candidate_ids(&self) -> Result<Vec<String>, SeedError>;
}

impl CandidateSource for Vec<String> {
    fn candidate_ids(&self) -> Result<Vec<String>, SeedError> {
        Ok(self.clone())
    }
}

/// Candidates stored as a JSON array of records
///
/// Each record must expose `id_field` as a string. Bare string entries are
/// taken as ids directly.
#[derive(Debug, Clone)]
pub struct JsonFileCandidates {
    path: PathBuf,
    id_field: String,
}

impl JsonFileCandidates {
    pub fn new(path: impl AsRef<Path>, id_field: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            id_field: id_field.into(),
        }
    }
}

impl CandidateSource for JsonFileCandidates {
    fn candidate_ids(&self) -> Result<Vec<String>, SeedError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SeedError::Io {
            path: self.path.clone(),
            source,
        })?;

        let parsed: Value = serde_json::from_str(&content).map_err(|source| SeedError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let Value::Array(entries) = parsed else {
            return Err(SeedError::NotAnArray {
                path: self.path.clone(),
            });
        };

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Value::String(id) => Ok(id.clone()),
                Value::Object(fields) => fields
                    .get(&self.id_field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| SeedError::MissingField {
                        index,
                        field: self.id_field.clone(),
                    }),
                _ => Err(SeedError::MissingField {
                    index,
                    field: self.id_field.clone(),
                }),
            })
            .collect()
    }
}
