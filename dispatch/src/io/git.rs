//! Git adapter for the provenance audit.
//!
//! Read-only: dispatch never commits. We keep a small, explicit wrapper
//! around `git` subprocess calls.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::provenance::{CommitRecord, parse_git_log};

/// `%x00` starts each record so multi-line trailers never bleed between commits.
const LOG_FORMAT: &str = "--format=%x00%H %s%n%(trailers:key=Signed-off-by,valueonly)";

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Commits since `since` (any date `git log --since` accepts), newest first,
    /// with their `Signed-off-by` trailer values.
    #[instrument(skip_all, fields(since))]
    pub fn log_signoffs(&self, since: &str) -> Result<Vec<CommitRecord>> {
        let args = vec![
            "log".to_string(),
            LOG_FORMAT.to_string(),
            format!("--since={since}"),
        ];
        let out = self.stdout(&args)?;
        let commits = parse_git_log(&out);
        debug!(count = commits.len(), "read commit log");
        Ok(commits)
    }

    /// Stdout of a successful git invocation; non-zero exit is an error carrying stderr.
    fn stdout(&self, args: &[String]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
