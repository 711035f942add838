//! Shared deterministic types for the coordination core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};

use crate::state::DispatchState;

/// Suffix the lead appends to a run name when creating its team.
pub const TEAM_SUFFIX: &str = "-parallel";

/// Host-provided identity of the calling process, resolved once at the entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookIdentity {
    /// Non-empty for workers; the name of the group the worker owns.
    pub teammate: Option<String>,
    /// Team context, if the host placed the caller inside a team.
    pub team: Option<String>,
}

impl HookIdentity {
    pub fn new(teammate: Option<String>, team: Option<String>) -> Self {
        Self {
            teammate: non_empty(teammate),
            team: non_empty(team),
        }
    }

    pub fn is_worker(&self) -> bool {
        self.teammate.is_some()
    }

    /// Run name derived from the team context, if any.
    pub fn team_run(&self) -> Option<String> {
        self.team.as_deref().map(run_name_for_team)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `demo-parallel` -> `demo`; names without the suffix are taken as-is.
pub fn run_name_for_team(team: &str) -> String {
    team.strip_suffix(TEAM_SUFFIX).unwrap_or(team).to_string()
}

pub fn team_name_for_run(run: &str) -> String {
    format!("{run}{TEAM_SUFFIX}")
}

/// Per-(run, session) retry counter kept outside the state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCounterRecord {
    pub count: u32,
    pub status_seen: String,
    #[serde(default)]
    pub dispatched_at_seen: Option<String>,
}

impl BlockCounterRecord {
    /// Count that still applies to `state`, or 0 if the run was re-dispatched.
    pub fn effective_count(&self, state: &DispatchState) -> u32 {
        if self.status_seen == state.status.label()
            && self.dispatched_at_seen == state.dispatched_at
        {
            self.count
        } else {
            0
        }
    }

    /// Record observed after one more block against `state`.
    pub fn next(count: u32, state: &DispatchState) -> Self {
        Self {
            count,
            status_seen: state.status.label().to_string(),
            dispatched_at_seen: state.dispatched_at.clone(),
        }
    }
}
