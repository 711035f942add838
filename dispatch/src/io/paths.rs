//! Canonical filesystem layout for dispatch runs.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

pub const STATE_FILE: &str = ".dispatch-state.json";
pub const TASKS_FILE: &str = "tasks.md";
pub const LOCK_FILE: &str = ".coordinator.lock";
pub const GATE_COUNTER_FILE: &str = ".gate-counter.json";

/// All canonical paths for a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub specs_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            specs_dir: root.join("specs"),
            config_path: root.join(".dispatch").join("config.toml"),
            root,
        }
    }

    pub fn run_dir(&self, run: &str) -> PathBuf {
        self.specs_dir.join(run)
    }

    pub fn state_path(&self, run: &str) -> PathBuf {
        self.run_dir(run).join(STATE_FILE)
    }

    pub fn tasks_path(&self, run: &str) -> PathBuf {
        self.run_dir(run).join(TASKS_FILE)
    }

    pub fn lock_path(&self, run: &str) -> PathBuf {
        self.run_dir(run).join(LOCK_FILE)
    }

    pub fn gate_counter_path(&self, run: &str) -> PathBuf {
        self.run_dir(run).join(GATE_COUNTER_FILE)
    }
}

/// Validate that a run name is safe to use as a single path component.
pub fn validate_run_name(run: &str) -> Result<()> {
    if run.is_empty() {
        return Err(anyhow!("run name must not be empty"));
    }
    if run == "." || run == ".." {
        return Err(anyhow!("run name must not be '{run}'"));
    }
    if run
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!("run name must be [A-Za-z0-9._-] only (got '{run}')"));
    }
    Ok(())
}

/// Project root: explicit override wins over the hook's `cwd`.
pub fn resolve_root(override_root: Option<&Path>, cwd: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = override_root {
        return Ok(root.to_path_buf());
    }
    if let Some(cwd) = cwd {
        return Ok(cwd.to_path_buf());
    }
    std::env::current_dir().map_err(|err| anyhow!("resolve current directory: {err}"))
}
