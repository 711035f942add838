//! Stop interception policy for the lead process.
//!
//! Pure decision logic: the caller has already resolved the run, loaded the
//! state record, the block counter and team liveness. The returned decision
//! says what to print and which side effects to apply (heartbeat, counter).

use crate::core::resolve::RunResolution;
use crate::core::types::BlockCounterRecord;
use crate::state::{DispatchState, DispatchStatus};

/// Default safety-valve ceiling.
pub const DEFAULT_MAX_BLOCKS: u32 = 3;

/// Inputs for one termination attempt against a resolved run.
#[derive(Debug, Clone, Copy)]
pub struct StopInputs<'a> {
    pub run: &'a str,
    pub resolution: &'a RunResolution,
    pub session_id: Option<&'a str>,
    pub state: &'a DispatchState,
    /// Unchecked items left in the task list.
    pub incomplete_tasks: usize,
    pub counter: Option<&'a BlockCounterRecord>,
    pub team_alive: bool,
    pub max_blocks: u32,
}

/// Why termination was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Caller is a worker; only the lead is intercepted.
    Worker,
    /// No run could be resolved for this caller.
    NoRun,
    /// Run is not `dispatched` (terminal or merging).
    NotActive,
    /// Team context names a run coordinated by another session.
    NotCoordinator,
    /// Every group is complete and nothing is left in the task list.
    Complete,
    /// Block ceiling reached.
    SafetyValve,
    /// Inherited legacy run whose team is gone.
    TeamGone,
}

impl AllowReason {
    /// True if the session's block counter should be deleted.
    ///
    /// The safety valve keeps its counter so a restarted turn cannot re-arm it.
    pub fn clears_counter(self) -> bool {
        matches!(self, AllowReason::NotActive | AllowReason::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopDecision {
    Allow(AllowReason),
    /// Keep working. `counter` is the record to persist after the heartbeat.
    Block {
        reason: String,
        counter: BlockCounterRecord,
    },
}

/// Decide whether the lead may terminate.
pub fn decide_stop(inputs: &StopInputs<'_>) -> StopDecision {
    let state = inputs.state;

    if state.status != DispatchStatus::Dispatched {
        return StopDecision::Allow(AllowReason::NotActive);
    }

    if let RunResolution::TeamContext(_) = inputs.resolution
        && let (Some(owner), Some(session)) = (state.coordinator(), inputs.session_id)
        && owner != session
    {
        return StopDecision::Allow(AllowReason::NotCoordinator);
    }

    if state.all_groups_completed() && inputs.incomplete_tasks == 0 {
        return StopDecision::Allow(AllowReason::Complete);
    }

    let count = inputs
        .counter
        .map(|record| record.effective_count(state))
        .unwrap_or(0);
    if count >= inputs.max_blocks {
        return StopDecision::Allow(AllowReason::SafetyValve);
    }

    if !inputs.team_alive && matches!(inputs.resolution, RunResolution::Ambiguous(_)) {
        return StopDecision::Allow(AllowReason::TeamGone);
    }

    let attempt = count + 1;
    StopDecision::Block {
        reason: block_reason(inputs, attempt),
        counter: BlockCounterRecord::next(attempt, state),
    }
}

fn block_reason(inputs: &StopInputs<'_>, attempt: u32) -> String {
    let state = inputs.state;
    let mut reason = format!(
        "Dispatch '{}' is still active: {}/{} groups complete, {} task(s) unchecked (block {}/{}).",
        inputs.run,
        state.completed_count(),
        state.groups.len(),
        inputs.incomplete_tasks,
        attempt,
        inputs.max_blocks,
    );
    if inputs.team_alive {
        reason.push_str(
            " Keep coordinating: wait for teammates, run verify checkpoints, and record completed groups before stopping.",
        );
    } else {
        reason.push_str(
            " The team for this dispatch is gone. Do not implement the remaining groups yourself; re-dispatch to spawn a fresh team, or abort the dispatch.",
        );
    }
    reason
}
