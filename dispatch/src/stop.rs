//! Stop Interceptor: decides whether the lead may terminate.
//!
//! Resolution, policy and effects are kept apart: [`resolve_run`] picks the
//! run, [`decide_stop`] decides, and this module applies the heartbeat and
//! block counter writes the decision calls for. Every failure degrades to
//! Allow.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::resolve::{Claimant, RunResolution, resolve_run};
use crate::core::stop_policy::{AllowReason, StopDecision, StopInputs, decide_stop};
use crate::core::types::{HookIdentity, team_name_for_run};
use crate::io::clock::Clock;
use crate::io::hook_input::StopInput;
use crate::io::paths::validate_run_name;
use crate::io::state_store::StoreError;
use crate::io::task_list::load_task_list;
use crate::io::team::TeamRegistry;
use crate::io::workspace::{ScannedRun, Workspace};
use crate::state::DispatchStatus;

/// Hook output printed on stdout when termination is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockResponse {
    pub decision: &'static str,
    pub reason: String,
}

impl BlockResponse {
    pub fn from_decision(decision: &StopDecision) -> Option<Self> {
        match decision {
            StopDecision::Block { reason, .. } => Some(Self {
                decision: "block",
                reason: reason.clone(),
            }),
            StopDecision::Allow(_) => None,
        }
    }
}

/// Run one termination attempt of the lead.
#[instrument(skip_all, fields(session = input.session_id.as_deref().unwrap_or("")))]
pub fn intercept_stop(
    ws: &Workspace,
    teams: &dyn TeamRegistry,
    clock: &dyn Clock,
    identity: &HookIdentity,
    input: &StopInput,
) -> StopDecision {
    if identity.is_worker() {
        debug!("caller is a worker");
        return StopDecision::Allow(AllowReason::Worker);
    }

    let session = input
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    debug!(stop_hook_active = input.stop_hook_active, "stop attempt");

    let team_run = identity.team_run();
    let scanned: Vec<ScannedRun> = if team_run.is_some() {
        Vec::new()
    } else {
        ws.scan(teams)
    };
    let candidates: Vec<_> = scanned.iter().map(ScannedRun::candidate).collect();
    let resolution = resolve_run(team_run.as_deref(), Claimant::Session(session), &candidates);

    let Some(run) = resolution.run() else {
        debug!("no run for this session");
        return StopDecision::Allow(AllowReason::NoRun);
    };
    if let Err(err) = validate_run_name(run) {
        warn!(run, err = %err, "ignoring unusable run name");
        return StopDecision::Allow(AllowReason::NoRun);
    }

    let state = match ws.store.try_load(run) {
        Ok(Some(state)) => state,
        Ok(None) => return StopDecision::Allow(AllowReason::NoRun),
        Err(err) => {
            warn!(run, err = %err, "state unreadable");
            return StopDecision::Allow(AllowReason::NoRun);
        }
    };

    let incomplete_tasks = match load_task_list(&ws.paths.tasks_path(run)) {
        Ok(list) => list.incomplete_count(),
        Err(err) => {
            warn!(run, err = %format!("{err:#}"), "task list unreadable, counting 0 unchecked");
            0
        }
    };
    let team_alive = match &resolution {
        RunResolution::TeamContext(_) | RunResolution::Owned(_) => {
            teams.is_alive(&team_name_for_run(run))
        }
        _ => scanned
            .iter()
            .find(|c| c.name == run)
            .map(|c| c.team_alive)
            .unwrap_or(false),
    };

    let counter_key = session.unwrap_or("");
    let counter = ws.counters.load(run, counter_key);
    let decision = decide_stop(&StopInputs {
        run,
        resolution: &resolution,
        session_id: session,
        state: &state,
        incomplete_tasks,
        counter: counter.as_ref(),
        team_alive,
        max_blocks: ws.config.max_blocks,
    });

    match &decision {
        StopDecision::Allow(reason) => {
            debug!(run, ?reason, "allowing stop");
            if reason.clears_counter()
                && let Err(err) = ws.counters.clear(run, counter_key)
            {
                warn!(run, err = %format!("{err:#}"), "failed to clear block counter");
            }
        }
        StopDecision::Block { counter, .. } => {
            write_heartbeat(ws, clock, run);
            if let Err(err) = ws.counters.save(run, counter_key, counter) {
                warn!(run, err = %format!("{err:#}"), "failed to persist block counter");
            }
            debug!(run, count = counter.count, "blocking stop");
        }
    }
    decision
}

/// Best-effort liveness proof. Never touches a record that left `dispatched`.
fn write_heartbeat(ws: &Workspace, clock: &dyn Clock, run: &str) {
    let now = clock.now_rfc3339();
    let result = ws.store.update(run, |state| {
        if state.status != DispatchStatus::Dispatched {
            return Err(StoreError::precondition(
                run,
                format!("status is {}", state.status.label()),
            ));
        }
        state.last_heartbeat = Some(now.clone());
        Ok(())
    });
    if let Err(err) = result {
        warn!(run, err = %err, "heartbeat not written");
    }
}
