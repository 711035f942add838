//! State Store: the single choke point for reading and writing dispatch records.
//!
//! Every component goes through [`StateStore::load`] and [`StateStore::update`].
//! `update` re-reads the freshest record, lets the caller check preconditions
//! and mutate it, then replaces the file atomically.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::io::atomic::write_json_atomic;
use crate::io::paths::{ProjectPaths, STATE_FILE};
use crate::state::DispatchState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no dispatch state at {0}")]
    NotFound(PathBuf),
    #[error("corrupt dispatch state {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("read dispatch state {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write dispatch state {path}: {source:#}")]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    /// The freshest record no longer satisfies the caller's precondition.
    #[error("precondition failed for run '{run}': {reason}")]
    Precondition { run: String, reason: String },
}

impl StoreError {
    pub fn precondition(run: &str, reason: impl Into<String>) -> Self {
        StoreError::Precondition {
            run: run.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors every hook treats as "no active run".
    pub fn is_absent(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Corrupt { .. })
    }
}

/// Repository over `specs/<run>/.dispatch-state.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: ProjectPaths,
}

impl StateStore {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    pub fn path(&self, run: &str) -> PathBuf {
        self.paths.state_path(run)
    }

    pub fn load(&self, run: &str) -> Result<DispatchState, StoreError> {
        load_state(&self.path(run))
    }

    /// Load, mapping missing and corrupt records to `None`.
    pub fn try_load(&self, run: &str) -> Result<Option<DispatchState>, StoreError> {
        match self.load(run) {
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_absent() => {
                debug!(run, err = %err, "treating dispatch state as absent");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// All readable runs, sorted by name. Unreadable records are skipped.
    pub fn list_runs(&self) -> Vec<(String, DispatchState)> {
        let Ok(entries) = fs::read_dir(&self.paths.specs_dir) else {
            return Vec::new();
        };
        let mut runs: Vec<(String, DispatchState)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(STATE_FILE).is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                match load_state(&entry.path().join(STATE_FILE)) {
                    Ok(state) => Some((name, state)),
                    Err(err) => {
                        debug!(run = %name, err = %err, "skipping unreadable dispatch state");
                        None
                    }
                }
            })
            .collect();
        runs.sort_by(|a, b| a.0.cmp(&b.0));
        runs
    }

    /// Read-modify-write against the freshest record.
    ///
    /// `mutate` may reject the record with [`StoreError::Precondition`]; nothing
    /// is written in that case.
    pub fn update<F>(&self, run: &str, mutate: F) -> Result<DispatchState, StoreError>
    where
        F: FnOnce(&mut DispatchState) -> Result<(), StoreError>,
    {
        let path = self.path(run);
        let mut state = load_state(&path)?;
        mutate(&mut state)?;
        debug!(run, status = state.status.label(), "writing dispatch state");
        write_json_atomic(&path, &state).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(state)
    }

    /// Write a complete record (used when creating runs).
    pub fn save(&self, run: &str, state: &DispatchState) -> Result<(), StoreError> {
        let path = self.path(run);
        write_json_atomic(&path, state).map_err(|source| StoreError::Write { path, source })
    }
}

fn load_state(path: &Path) -> Result<DispatchState, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
