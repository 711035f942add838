//! Coordinator lock: `<run dir>/.coordinator.lock` names the session
//! currently protecting the run's working tree.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_json_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorLock {
    pub session_id: String,
    pub acquired_at: String,
}

#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Option<CoordinatorLock> {
        let contents = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Record `session` as the holder, replacing any previous holder.
    pub fn take_over(&self, session: &str, now: &str) -> Result<()> {
        let lock = CoordinatorLock {
            session_id: session.to_string(),
            acquired_at: now.to_string(),
        };
        write_json_atomic(&self.path, &lock)
    }

    /// Remove the lock. Returns the previous holder, if any.
    pub fn release(&self) -> Result<Option<CoordinatorLock>> {
        let previous = self.read();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(previous),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}
