//! JSON-file job storage, rewritten in full on every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Job;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Schedule file decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Durable schedule store: a pretty-printed JSON array of jobs so the file
/// stays human-diffable.
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty schedule; a corrupt file is an error.
    pub fn load(&self) -> Result<Vec<Job>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, jobs: &[Job]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(jobs)?)?;
        Ok(())
    }
}
