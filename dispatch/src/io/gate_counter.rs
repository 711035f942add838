//! Per-run count of units admitted by the quality gate.
//!
//! Drives the periodic build/test cadence. Only full passes advance it, and
//! a re-dispatch (new `dispatchedAt`) starts the count over.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_json_atomic;
use crate::state::DispatchState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCounter {
    pub completed: u32,
    #[serde(default)]
    pub last_unit: Option<String>,
    #[serde(default)]
    pub dispatched_at_seen: Option<String>,
}

impl GateCounter {
    /// Units admitted so far for this dispatch of the run.
    pub fn effective_completed(&self, state: &DispatchState) -> u32 {
        if self.dispatched_at_seen == state.dispatched_at {
            self.completed
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateCounterFile {
    path: PathBuf,
}

impl GateCounterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing or unreadable counters start from zero.
    pub fn load(&self) -> GateCounter {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, counter: &GateCounter) -> Result<()> {
        write_json_atomic(&self.path, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dispatched_state;

    #[test]
    fn starts_at_zero_and_persists() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = GateCounterFile::new(temp.path().join(".gate-counter.json"));
        assert_eq!(file.load().completed, 0);

        file.save(&GateCounter {
            completed: 4,
            last_unit: Some("2.1".to_string()),
            dispatched_at_seen: None,
        })
        .expect("save");
        assert_eq!(file.load().completed, 4);
    }

    #[test]
    fn count_from_an_earlier_dispatch_does_not_apply() {
        let state = dispatched_state(Vec::new());
        let counter = GateCounter {
            completed: 4,
            last_unit: Some("2.1".to_string()),
            dispatched_at_seen: state.dispatched_at.clone(),
        };
        assert_eq!(counter.effective_completed(&state), 4);

        let mut redispatched = state.clone();
        redispatched.dispatched_at = Some("2026-03-02T09:00:00Z".to_string());
        assert_eq!(counter.effective_completed(&redispatched), 0);
    }
}
