//! `dispatch mark-complete`: check off the tasks of completed groups.

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

use crate::core::tasks::{MarkReport, mark_complete};
use crate::io::paths::validate_run_name;
use crate::io::task_list::{read_task_list, write_task_list};
use crate::io::workspace::Workspace;
use crate::state::DispatchState;

/// Mark every task owned by a completed group. Missing or corrupt state is a
/// no-op; a missing task list with something to mark is an error.
pub fn mark_completed_tasks(ws: &Workspace, run: &str, dry_run: bool) -> Result<MarkReport> {
    validate_run_name(run)?;
    let empty = MarkReport {
        dry_run,
        ..MarkReport::default()
    };

    let state = match ws.store.try_load(run) {
        Ok(Some(state)) => state,
        Ok(None) => {
            debug!(run, "no dispatch state, nothing to mark");
            return Ok(empty);
        }
        Err(err) => return Err(anyhow!(err)),
    };

    let ids = completed_task_ids(&state);
    if ids.is_empty() {
        return Ok(empty);
    }

    let path = ws.paths.tasks_path(run);
    let Some(content) = read_task_list(&path)? else {
        warn!(run, path = %path.display(), "task list missing");
        return Err(anyhow!("tasks.md not found: {}", path.display()));
    };

    let (updated, mut report) = mark_complete(&content, &ids);
    report.dry_run = dry_run;
    if report.marked > 0 && !dry_run {
        write_task_list(&path, &updated)?;
    }
    debug!(run, marked = report.marked, dry_run, "marked tasks");
    Ok(report)
}

/// Task ids of completed groups, in group order, without duplicates.
fn completed_task_ids(state: &DispatchState) -> Vec<String> {
    let completed: HashSet<&str> = state.completed_groups.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    state
        .groups
        .iter()
        .filter(|group| completed.contains(group.name.as_str()))
        .flat_map(|group| group.tasks.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
