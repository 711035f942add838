//! Dispatch state record (`specs/<run>/.dispatch-state.json`).
//!
//! One record per orchestration run. Every hook reads it and only a few
//! fields are ever written back (status, coordinator id, heartbeat). Fields
//! this crate does not interpret are preserved verbatim in `extra` so a
//! read-modify-write never drops data written by other collaborators.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a dispatch.
///
/// `dispatched` and `merging` are active; everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Dispatched,
    Merging,
    Merged,
    Superseded,
    Aborted,
    Stale,
}

impl DispatchStatus {
    pub fn label(self) -> &'static str {
        match self {
            DispatchStatus::Dispatched => "dispatched",
            DispatchStatus::Merging => "merging",
            DispatchStatus::Merged => "merged",
            DispatchStatus::Superseded => "superseded",
            DispatchStatus::Aborted => "aborted",
            DispatchStatus::Stale => "stale",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, DispatchStatus::Dispatched | DispatchStatus::Merging)
    }

    /// True if the state machine permits moving from `self` to `next`.
    ///
    /// Re-dispatching (back to `dispatched`) is not a transition: it writes a
    /// fresh record with a new `dispatchedAt`.
    pub fn can_transition_to(self, next: DispatchStatus) -> bool {
        use DispatchStatus::{Aborted, Dispatched, Merged, Merging, Stale, Superseded};
        matches!(
            (self, next),
            (Dispatched, Merging | Aborted | Superseded | Stale)
                | (Merging, Merged | Aborted | Superseded)
        )
    }
}

/// One partition of the work-item list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub owned_files: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Task ids (`X.Y`) assigned to this group.
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Shell commands for the quality gate. `"N/A"` means not declared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typecheck: Option<String>,
}

impl QualityCommands {
    pub fn build(&self) -> Option<&str> {
        declared(self.build.as_deref())
    }

    pub fn test(&self) -> Option<&str> {
        declared(self.test.as_deref())
    }

    pub fn typecheck(&self) -> Option<&str> {
        declared(self.typecheck.as_deref())
    }
}

fn declared(command: Option<&str>) -> Option<&str> {
    command
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty() && *cmd != "N/A")
}

/// Pre-run quality signal captured at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSnapshot {
    /// Passing test count before the run, `-1` when unknown.
    #[serde(default = "unknown_count")]
    pub test_count: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn unknown_count() -> i64 {
    -1
}

impl BaselineSnapshot {
    pub fn known_test_count(&self) -> Option<u64> {
        u64::try_from(self.test_count).ok()
    }
}

/// Persisted dispatch record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchState {
    pub status: DispatchStatus,
    /// Identity token of this run instance; a re-dispatch issues a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator_session_id: Option<String>,
    /// RFC 3339 timestamp of the last block emitted by the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<String>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub completed_groups: Vec<String>,
    #[serde(default)]
    pub quality_commands: QualityCommands,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_snapshot: Option<BaselineSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DispatchState {
    /// A fresh `dispatched` record with no groups.
    pub fn dispatched(dispatched_at: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Dispatched,
            dispatched_at: Some(dispatched_at.into()),
            coordinator_session_id: None,
            last_heartbeat: None,
            groups: Vec::new(),
            completed_groups: Vec::new(),
            quality_commands: QualityCommands::default(),
            baseline_snapshot: None,
            stale_reason: None,
            stale_since: None,
            aborted_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Coordinator session id, treating null and empty as unclaimed.
    pub fn coordinator(&self) -> Option<&str> {
        self.coordinator_session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Number of distinct groups recorded as completed.
    pub fn completed_count(&self) -> usize {
        let known: BTreeSet<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        self.completed_groups
            .iter()
            .map(String::as_str)
            .filter(|name| known.contains(name))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn all_groups_completed(&self) -> bool {
        self.completed_count() >= self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_record_and_preserves_unknown_fields() {
        let raw = r#"{
            "status": "dispatched",
            "dispatchedAt": "2026-01-01T00:00:00Z",
            "coordinatorSessionId": null,
            "groups": [{"name": "g1", "ownedFiles": ["a.ts"], "tasks": ["1.1"], "index": 0}],
            "completedGroups": [],
            "qualityCommands": {"build": "npm run build", "test": "N/A"},
            "baselineSnapshot": {"testCount": 42, "capturedAt": "x"},
            "totalTasks": 7
        }"#;
        let state: DispatchState = serde_json::from_str(raw).expect("parse");
        assert_eq!(state.status, DispatchStatus::Dispatched);
        assert_eq!(state.coordinator(), None);
        assert_eq!(state.groups[0].owned_files, vec!["a.ts"]);
        assert_eq!(state.quality_commands.build(), Some("npm run build"));
        assert_eq!(state.quality_commands.test(), None);
        assert_eq!(
            state.baseline_snapshot.as_ref().and_then(|b| b.known_test_count()),
            Some(42)
        );

        let written = serde_json::to_value(&state).expect("serialize");
        assert_eq!(written["totalTasks"], 7);
        assert_eq!(written["groups"][0]["index"], 0);
        assert_eq!(written["baselineSnapshot"]["capturedAt"], "x");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = serde_json::from_str::<DispatchState>(r#"{"status":"paused"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn completed_count_ignores_duplicates_and_unknown_groups() {
        let mut state = DispatchState::dispatched("t0");
        state.groups = vec![
            Group {
                name: "g1".to_string(),
                owned_files: Vec::new(),
                dependencies: Vec::new(),
                tasks: Vec::new(),
                extra: BTreeMap::new(),
            },
            Group {
                name: "g2".to_string(),
                owned_files: Vec::new(),
                dependencies: Vec::new(),
                tasks: Vec::new(),
                extra: BTreeMap::new(),
            },
        ];
        state.completed_groups = vec!["g1".into(), "g1".into(), "ghost".into()];
        assert_eq!(state.completed_count(), 1);
        assert!(!state.all_groups_completed());
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(DispatchStatus::Dispatched.can_transition_to(DispatchStatus::Stale));
        assert!(DispatchStatus::Merging.can_transition_to(DispatchStatus::Merged));
        assert!(!DispatchStatus::Aborted.can_transition_to(DispatchStatus::Dispatched));
        assert!(!DispatchStatus::Merged.can_transition_to(DispatchStatus::Aborted));
        assert!(!DispatchStatus::Stale.can_transition_to(DispatchStatus::Merging));
    }
}
