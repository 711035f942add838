//! Reclaim Resolver: runs once when a new session starts.
//!
//! Each `dispatched` run is judged independently by [`decide_reclaim`]; the
//! resulting write goes through the State Store with the decision's
//! precondition re-checked against the freshest record.

use std::fmt;

use tracing::{debug, info_span, warn};

use crate::core::reclaim_policy::{ReclaimAction, decide_reclaim, format_age};
use crate::io::clock::Clock;
use crate::io::hook_input::SessionStartInput;
use crate::io::state_store::StoreError;
use crate::io::team::TeamRegistry;
use crate::io::workspace::Workspace;
use crate::state::DispatchStatus;

/// What happened to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReclaim {
    pub run: String,
    pub action: ReclaimAction,
    /// Set when the decided write could not be applied.
    pub failure: Option<String>,
}

impl fmt::Display for RunReclaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = &self.run;
        match &self.action {
            ReclaimAction::Inactive | ReclaimAction::AlreadyOwned => {
                write!(f, "dispatch '{run}': nothing to do")?;
            }
            ReclaimAction::Adopt => write!(f, "dispatch '{run}': adopted unclaimed run")?,
            ReclaimAction::LeaveUnclaimed => {
                write!(f, "dispatch '{run}': unclaimed and no live team, left as is")?;
            }
            ReclaimAction::MarkStale { previous } => write!(
                f,
                "dispatch '{run}': coordinator {previous} is gone and its team has no members; marked stale"
            )?,
            ReclaimAction::Reclaim {
                previous,
                heartbeat_age,
            } => {
                let age = heartbeat_age
                    .map(format_age)
                    .unwrap_or_else(|| "no heartbeat".to_string());
                write!(
                    f,
                    "dispatch '{run}': reclaimed from {previous} (last heartbeat: {age})"
                )?;
            }
            ReclaimAction::Skip {
                current,
                heartbeat_age,
            } => write!(
                f,
                "dispatch '{run}': session {current} is actively coordinating (heartbeat {} ago); not reclaiming",
                format_age(*heartbeat_age)
            )?,
        }
        if let Some(failure) = &self.failure {
            write!(f, " [failed: {failure}]")?;
        }
        Ok(())
    }
}

impl RunReclaim {
    /// Worth a status line to the operator.
    pub fn is_notable(&self) -> bool {
        !matches!(
            self.action,
            ReclaimAction::Inactive | ReclaimAction::AlreadyOwned | ReclaimAction::LeaveUnclaimed
        ) || self.failure.is_some()
    }
}

/// Inspect every `dispatched` run on behalf of the new session.
pub fn reclaim_on_session_start(
    ws: &Workspace,
    teams: &dyn TeamRegistry,
    clock: &dyn Clock,
    input: &SessionStartInput,
) -> Vec<RunReclaim> {
    let Some(session) = input
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        debug!("no session id, nothing to reclaim");
        return Vec::new();
    };
    debug!(session, source = input.source.as_deref().unwrap_or(""), "session start");

    let now = clock.now();
    let threshold = ws.config.reclaim_threshold();
    ws.scan(teams)
        .into_iter()
        .filter(|run| run.state.status == DispatchStatus::Dispatched)
        .map(|run| {
            let _span = info_span!("reclaim", run = %run.name).entered();
            let action = decide_reclaim(&run.state, session, run.team_alive, now, threshold);
            let failure = apply(ws, clock, &run.name, session, &action)
                .err()
                .map(|err| err.to_string());
            if let Some(failure) = &failure {
                warn!(run = %run.name, failure = %failure, "reclaim write failed");
            }
            RunReclaim {
                run: run.name,
                action,
                failure,
            }
        })
        .collect()
}

fn apply(
    ws: &Workspace,
    clock: &dyn Clock,
    run: &str,
    session: &str,
    action: &ReclaimAction,
) -> Result<(), StoreError> {
    let now = clock.now_rfc3339();
    match action {
        ReclaimAction::Inactive
        | ReclaimAction::AlreadyOwned
        | ReclaimAction::LeaveUnclaimed
        | ReclaimAction::Skip { .. } => Ok(()),
        ReclaimAction::Adopt => {
            ws.store.update(run, |state| {
                ensure_dispatched(run, state.status)?;
                if let Some(owner) = state.coordinator() {
                    return Err(StoreError::precondition(
                        run,
                        format!("claimed by {owner} meanwhile"),
                    ));
                }
                state.coordinator_session_id = Some(session.to_string());
                Ok(())
            })?;
            take_lock(ws, run, session, &now);
            Ok(())
        }
        ReclaimAction::Reclaim { previous, .. } => {
            ws.store.update(run, |state| {
                ensure_dispatched(run, state.status)?;
                ensure_owner(run, state.coordinator(), previous)?;
                state.coordinator_session_id = Some(session.to_string());
                Ok(())
            })?;
            take_lock(ws, run, session, &now);
            Ok(())
        }
        ReclaimAction::MarkStale { previous } => {
            ws.store.update(run, |state| {
                ensure_dispatched(run, state.status)?;
                ensure_owner(run, state.coordinator(), previous)?;
                state.status = DispatchStatus::Stale;
                state.stale_reason = Some(format!(
                    "coordinator {previous} gone and team has no live members"
                ));
                state.stale_since = Some(now.clone());
                Ok(())
            })?;
            if let Err(err) = ws.lock(run).release() {
                warn!(run, err = %format!("{err:#}"), "failed to release coordinator lock");
            }
            Ok(())
        }
    }
}

fn ensure_dispatched(run: &str, status: DispatchStatus) -> Result<(), StoreError> {
    if status != DispatchStatus::Dispatched {
        return Err(StoreError::precondition(
            run,
            format!("status changed to {}", status.label()),
        ));
    }
    Ok(())
}

fn ensure_owner(run: &str, owner: Option<&str>, expected: &str) -> Result<(), StoreError> {
    if owner != Some(expected) {
        return Err(StoreError::precondition(
            run,
            format!(
                "coordinator changed from {expected} to {}",
                owner.unwrap_or("none")
            ),
        ));
    }
    Ok(())
}

fn take_lock(ws: &Workspace, run: &str, session: &str, now: &str) {
    if let Err(err) = ws.lock(run).take_over(session, now) {
        warn!(run, err = %format!("{err:#}"), "failed to record coordinator lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FakeTeams, FixedClock, TestProject, coordinated_state, dispatched_state, group,
        minutes_before_now,
    };

    fn start(session: &str) -> SessionStartInput {
        SessionStartInput {
            session_id: Some(session.to_string()),
            source: Some("startup".to_string()),
            cwd: None,
        }
    }

    #[test]
    fn adopts_unclaimed_run_with_live_team() {
        let project = TestProject::new().expect("project");
        project
            .write_state("demo", &dispatched_state(vec![group("g1", &[])]))
            .expect("state");

        let report = reclaim_on_session_start(
            &project.workspace,
            &FakeTeams::alive_runs(&["demo"]),
            &FixedClock::default(),
            &start("S_NEW"),
        );

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].action, ReclaimAction::Adopt);
        let state = project.load_state("demo").expect("load");
        assert_eq!(state.coordinator(), Some("S_NEW"));
        let lock = project.workspace.lock("demo").read().expect("lock");
        assert_eq!(lock.session_id, "S_NEW");
    }

    #[test]
    fn marks_stale_and_releases_lock_when_team_gone() {
        let project = TestProject::new().expect("project");
        project
            .write_state("demo", &coordinated_state(vec![group("g1", &[])], "S_OLD"))
            .expect("state");
        project
            .workspace
            .lock("demo")
            .take_over("S_OLD", "t0")
            .expect("lock");

        let report = reclaim_on_session_start(
            &project.workspace,
            &FakeTeams::none(),
            &FixedClock::default(),
            &start("S_NEW"),
        );

        assert!(matches!(report[0].action, ReclaimAction::MarkStale { .. }));
        let state = project.load_state("demo").expect("load");
        assert_eq!(state.status, DispatchStatus::Stale);
        assert!(state.stale_reason.is_some());
        assert!(state.stale_since.is_some());
        assert_eq!(state.coordinator(), Some("S_OLD"));
        assert!(project.workspace.lock("demo").read().is_none());
    }

    #[test]
    fn fresh_heartbeat_is_respected() {
        let project = TestProject::new().expect("project");
        let mut state = coordinated_state(vec![group("g1", &[])], "S_OLD");
        state.last_heartbeat = Some(minutes_before_now(2));
        project.write_state("demo", &state).expect("state");

        let report = reclaim_on_session_start(
            &project.workspace,
            &FakeTeams::alive_runs(&["demo"]),
            &FixedClock::default(),
            &start("S_NEW"),
        );

        assert!(matches!(report[0].action, ReclaimAction::Skip { .. }));
        assert!(report[0].to_string().contains("not reclaiming"));
        assert_eq!(
            project.load_state("demo").expect("load").coordinator(),
            Some("S_OLD")
        );
    }

    #[test]
    fn terminal_runs_are_ignored_and_missing_session_is_a_no_op() {
        let project = TestProject::new().expect("project");
        let mut state = coordinated_state(vec![group("g1", &[])], "S_OLD");
        state.status = DispatchStatus::Aborted;
        project.write_state("old", &state).expect("state");

        let report = reclaim_on_session_start(
            &project.workspace,
            &FakeTeams::none(),
            &FixedClock::default(),
            &start("S_NEW"),
        );
        assert!(report.is_empty());

        let report = reclaim_on_session_start(
            &project.workspace,
            &FakeTeams::none(),
            &FixedClock::default(),
            &SessionStartInput::default(),
        );
        assert!(report.is_empty());
    }
}
