//! JSON payloads the host writes to a hook's stdin.
//!
//! Every field is optional: the host adds fields over time and a missing
//! field must degrade, not fail.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// True when the host re-invokes after a block in the same turn.
    #[serde(default)]
    pub stop_hook_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionStartInput {
    #[serde(default)]
    pub session_id: Option<String>,
    /// `startup`, `resume`, `clear` or `compact`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolUseInput {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: ToolInput,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ToolUseInput {
    /// Only whole-file writes and in-place edits are enforced.
    pub fn is_write(&self) -> bool {
        matches!(self.tool_name.as_deref(), Some("Write" | "Edit"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskCompletedInput {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_subject: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Parse a hook payload. Empty input yields the default payload.
pub fn read_input<T, R>(mut reader: R) -> Result<T>
where
    T: DeserializeOwned + Default,
    R: Read,
{
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .context("read hook input")?;
    if buf.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&buf).context("parse hook input json")
}
