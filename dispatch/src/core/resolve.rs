//! Deterministic run resolution for hook callers.
//!
//! A caller either carries a team context (the run is named directly) or we
//! scan active runs for one it can claim. The scan is the legacy fallback and
//! is kept explicit so every hook resolves runs the same way.

use crate::state::{DispatchState, DispatchStatus};

/// One dispatch considered during a scan, with its team liveness already read.
#[derive(Debug, Clone, Copy)]
pub struct RunCandidate<'a> {
    pub name: &'a str,
    pub state: &'a DispatchState,
    pub team_alive: bool,
}

/// Who is asking; decides which scanned runs can be claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claimant<'a> {
    /// The lead, identified by its session id (possibly missing).
    Session(Option<&'a str>),
    /// A worker, identified by the group it owns.
    Writer(&'a str),
}

/// How a run was matched to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResolution {
    /// Named by the caller's team context.
    TeamContext(String),
    /// Matched by coordinator id (lead) or group name (worker).
    Owned(String),
    /// Ownership unknown, inherited because the run's team is alive.
    Ambiguous(String),
    None,
}

impl RunResolution {
    pub fn run(&self) -> Option<&str> {
        match self {
            RunResolution::TeamContext(run)
            | RunResolution::Owned(run)
            | RunResolution::Ambiguous(run) => Some(run),
            RunResolution::None => None,
        }
    }
}

/// Resolve which run the caller belongs to.
///
/// `team_run` wins outright. Otherwise only `dispatched` candidates are
/// considered, in the order given, and the first claimable one is returned.
pub fn resolve_run(
    team_run: Option<&str>,
    claimant: Claimant<'_>,
    candidates: &[RunCandidate<'_>],
) -> RunResolution {
    if let Some(run) = team_run {
        return RunResolution::TeamContext(run.to_string());
    }

    let active = candidates
        .iter()
        .filter(|c| c.state.status == DispatchStatus::Dispatched);

    for candidate in active {
        match claimant {
            Claimant::Session(session) => {
                let coordinator = candidate.state.coordinator();
                match (coordinator, session) {
                    (Some(owner), Some(session)) if owner == session => {
                        return RunResolution::Owned(candidate.name.to_string());
                    }
                    (None, _) | (_, None) if candidate.team_alive => {
                        return RunResolution::Ambiguous(candidate.name.to_string());
                    }
                    _ => {}
                }
            }
            Claimant::Writer(writer) => {
                if candidate.team_alive && candidate.state.group(writer).is_some() {
                    return RunResolution::Owned(candidate.name.to_string());
                }
            }
        }
    }

    RunResolution::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DispatchState;

    fn state_with_coordinator(coordinator: Option<&str>) -> DispatchState {
        let mut state = DispatchState::dispatched("t0");
        state.coordinator_session_id = coordinator.map(str::to_string);
        state
    }

    #[test]
    fn team_context_names_run_directly() {
        let resolution = resolve_run(Some("demo"), Claimant::Session(Some("s1")), &[]);
        assert_eq!(resolution, RunResolution::TeamContext("demo".to_string()));
    }

    #[test]
    fn session_match_is_owned_even_when_team_is_gone() {
        let state = state_with_coordinator(Some("s1"));
        let candidates = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: false,
        }];
        let resolution = resolve_run(None, Claimant::Session(Some("s1")), &candidates);
        assert_eq!(resolution, RunResolution::Owned("demo".to_string()));
    }

    #[test]
    fn foreign_coordinator_is_skipped() {
        let state = state_with_coordinator(Some("other"));
        let candidates = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: true,
        }];
        let resolution = resolve_run(None, Claimant::Session(Some("s1")), &candidates);
        assert_eq!(resolution, RunResolution::None);
    }

    #[test]
    fn unclaimed_run_is_inherited_only_with_live_team() {
        let state = state_with_coordinator(None);
        let dead = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: false,
        }];
        assert_eq!(
            resolve_run(None, Claimant::Session(Some("s1")), &dead),
            RunResolution::None
        );

        let alive = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: true,
        }];
        assert_eq!(
            resolve_run(None, Claimant::Session(Some("s1")), &alive),
            RunResolution::Ambiguous("demo".to_string())
        );
    }

    #[test]
    fn missing_session_id_is_ambiguous() {
        let state = state_with_coordinator(Some("s1"));
        let candidates = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: true,
        }];
        assert_eq!(
            resolve_run(None, Claimant::Session(None), &candidates),
            RunResolution::Ambiguous("demo".to_string())
        );
    }

    #[test]
    fn terminal_runs_are_never_scanned() {
        let mut state = state_with_coordinator(Some("s1"));
        state.status = DispatchStatus::Merged;
        let candidates = [RunCandidate {
            name: "demo",
            state: &state,
            team_alive: true,
        }];
        assert_eq!(
            resolve_run(None, Claimant::Session(Some("s1")), &candidates),
            RunResolution::None
        );
    }

    #[test]
    fn writer_matches_run_holding_its_group() {
        let empty = DispatchState::dispatched("t0");
        let mut with_group = DispatchState::dispatched("t0");
        with_group.groups.push(crate::state::Group {
            name: "g1".to_string(),
            owned_files: vec!["a.ts".to_string()],
            dependencies: Vec::new(),
            tasks: Vec::new(),
            extra: Default::default(),
        });
        let candidates = [
            RunCandidate {
                name: "alpha",
                state: &empty,
                team_alive: true,
            },
            RunCandidate {
                name: "beta",
                state: &with_group,
                team_alive: true,
            },
        ];
        assert_eq!(
            resolve_run(None, Claimant::Writer("g1"), &candidates),
            RunResolution::Owned("beta".to_string())
        );
    }
}
