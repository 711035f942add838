//! `dispatch abort`: explicit cancellation of an in-flight run.

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

use crate::io::clock::Clock;
use crate::io::paths::validate_run_name;
use crate::io::state_store::StoreError;
use crate::io::workspace::Workspace;
use crate::state::{DispatchState, DispatchStatus};

/// Move a `dispatched` or `merging` run to `aborted` and release its lock.
///
/// The status write must succeed; the lock release is best-effort.
pub fn abort_run(ws: &Workspace, clock: &dyn Clock, run: &str) -> Result<DispatchState> {
    validate_run_name(run)?;
    let now = clock.now_rfc3339();
    let state = ws
        .store
        .update(run, |state| {
            if !state.status.can_transition_to(DispatchStatus::Aborted) {
                return Err(StoreError::precondition(
                    run,
                    format!("cannot abort a {} run", state.status.label()),
                ));
            }
            state.status = DispatchStatus::Aborted;
            state.aborted_at = Some(now.clone());
            Ok(())
        })
        .map_err(|err| anyhow!(err))?;

    if let Err(err) = ws.lock(run).release() {
        warn!(run, err = %format!("{err:#}"), "failed to release coordinator lock");
    }
    debug!(run, "run aborted");
    Ok(state)
}
