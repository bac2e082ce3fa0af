//! Flat-file storage implementation
//!
//! Progress lives in a JSON document mapping run keys to their state; it is
//! rewritten whole through a temporary file that is then renamed over the
//! original. Records are appended to a JSON-Lines file and synced one by one.

use crate::crawler::CanonicalRecord;
use crate::state::ProgressState;
use crate::storage::traits::{OutputStore, ProgressStore, StorageError, StorageResult};
use crate::storage::RunStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persisted form of one run inside the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunEntry {
    status: RunStatus,
    processed: Vec<String>,
    remaining: Vec<String>,
    failed: Vec<String>,
}

impl RunEntry {
    fn from_state(status: RunStatus, state: &ProgressState) -> Self {
        Self {
            status,
            processed: state.processed().to_vec(),
            remaining: state.remaining().iter().cloned().collect(),
            failed: state.failed().to_vec(),
        }
    }

    fn to_state(&self) -> StorageResult<ProgressState> {
        Ok(ProgressState::from_parts(
            self.processed.clone(),
            self.remaining.clone(),
            self.failed.clone(),
        )?)
    }
}

/// File-backed storage: a JSON state file plus a JSON-Lines record log
pub struct FileStorage {
    state_path: PathBuf,
    output_path: PathBuf,
    runs: BTreeMap<String, RunEntry>,
    record_ids: HashSet<String>,
    item_ids: HashSet<String>,
    output: File,
}

impl FileStorage {
    /// Opens both files, creating the record log if needed
    ///
    /// A record line cut short by a crash mid-append is truncated away.
    /// Any other unreadable line makes the store `Corrupt`.
    pub fn open(state_path: &Path, output_path: &Path) -> StorageResult<Self> {
        let runs = read_state_file(state_path)?;
        let (record_ids, item_ids) = recover_output(output_path)?;

        let output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)?;

        tracing::debug!(
            "Opened file storage: {} runs, {} records",
            runs.len(),
            record_ids.len()
        );

        Ok(Self {
            state_path: state_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            runs,
            record_ids,
            item_ids,
            output,
        })
    }

    /// Replaces the state file in one rename
    ///
    /// On Unix the directory is synced after the rename so the new entry
    /// survives a power loss. Elsewhere the rename itself is the last step.
    fn write_state_file(&self, runs: &BTreeMap<String, RunEntry>) -> StorageResult<()> {
        let dir = match self.state_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, runs)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.state_path)
            .map_err(|e| StorageError::Io(e.error))?;

        #[cfg(unix)]
        File::open(dir)?.sync_all()?;

        Ok(())
    }

    fn update_runs<F>(&mut self, update: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, RunEntry>) -> StorageResult<()>,
    {
        let mut runs = self.runs.clone();
        update(&mut runs)?;
        self.write_state_file(&runs)?;
        self.runs = runs;
        Ok(())
    }
}

fn read_state_file(path: &Path) -> StorageResult<BTreeMap<String, RunEntry>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    Ok(serde_json::from_str(&content)?)
}

/// Scans the record log, returning the known record ids and item ids
fn recover_output(path: &Path) -> StorageResult<(HashSet<String>, HashSet<String>)> {
    let mut record_ids = HashSet::new();
    let mut item_ids = HashSet::new();

    if !path.exists() {
        return Ok((record_ids, item_ids));
    }

    let content = std::fs::read(path)?;
    let mut good_len = 0usize;
    let mut start = 0usize;

    while start < content.len() {
        let (line, next, terminated) = match content[start..].iter().position(|b| *b == b'\n') {
            Some(i) => (&content[start..start + i], start + i + 1, true),
            None => (&content[start..], content.len(), false),
        };

        if line.iter().all(u8::is_ascii_whitespace) {
            good_len = next;
            start = next;
            continue;
        }

        match serde_json::from_slice::<CanonicalRecord>(line) {
            Ok(record) => {
                record_ids.insert(record.id.key());
                item_ids.insert(record.slug);
                good_len = next;
            }
            Err(e) if !terminated => {
                tracing::warn!(
                    "Discarding torn record at byte {} of {}: {}",
                    start,
                    path.display(),
                    e
                );
                break;
            }
            Err(e) => {
                return Err(StorageError::Corrupt(format!(
                    "{} at byte {}: {}",
                    path.display(),
                    start,
                    e
                )))
            }
        }

        start = next;
    }

    if good_len < content.len() {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(good_len as u64)?;
        file.sync_all()?;
    }

    // A final complete record without its newline would merge with the next append
    if good_len > 0 && content[good_len - 1] != b'\n' {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    Ok((record_ids, item_ids))
}

impl ProgressStore for FileStorage {
    fn read_progress(&self, run_key: &str) -> StorageResult<Option<ProgressState>> {
        self.runs.get(run_key).map(RunEntry::to_state).transpose()
    }

    fn save(&mut self, run_key: &str, state: &ProgressState) -> StorageResult<()> {
        let status = self
            .runs
            .get(run_key)
            .map(|entry| entry.status)
            .unwrap_or(RunStatus::Running);
        let entry = RunEntry::from_state(status, state);

        self.update_runs(|runs| {
            runs.insert(run_key.to_string(), entry);
            Ok(())
        })
    }

    fn set_run_status(&mut self, run_key: &str, status: RunStatus) -> StorageResult<()> {
        self.update_runs(|runs| match runs.get_mut(run_key) {
            Some(entry) => {
                entry.status = status;
                Ok(())
            }
            None => Err(StorageError::RunNotFound(run_key.to_string())),
        })
    }

    fn run_status(&self, run_key: &str) -> StorageResult<Option<RunStatus>> {
        Ok(self.runs.get(run_key).map(|entry| entry.status))
    }
}

impl OutputStore for FileStorage {
    fn exists(&self, item_id: &str) -> StorageResult<bool> {
        Ok(self.item_ids.contains(item_id))
    }

    fn insert(&mut self, record: &CanonicalRecord) -> StorageResult<()> {
        let key = record.id.key();
        if self.record_ids.contains(&key) || self.item_ids.contains(&record.slug) {
            return Err(StorageError::DuplicateKey { key });
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.output.write_all(&line)?;
        self.output.sync_data()?;

        self.record_ids.insert(key);
        self.item_ids.insert(record.slug.clone());
        Ok(())
    }

    fn get(&self, item_id: &str) -> StorageResult<Option<CanonicalRecord>> {
        if !self.item_ids.contains(item_id) {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.output_path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CanonicalRecord = serde_json::from_str(&line)?;
            if record.slug == item_id {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.record_ids.len() as u64)
    }
}
