//! Reading and rewriting the run's `tasks.md`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::tasks::TaskList;
use crate::io::atomic::write_atomic;

/// Raw task list text, or `None` when the file does not exist.
pub fn read_task_list(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

/// Parsed task list; a missing file parses as empty.
pub fn load_task_list(path: &Path) -> Result<TaskList> {
    Ok(read_task_list(path)?
        .map(|text| TaskList::parse(&text))
        .unwrap_or_default())
}

pub fn write_task_list(path: &Path, contents: &str) -> Result<()> {
    write_atomic(path, contents.as_bytes())
}
