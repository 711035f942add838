//! Coordinator reclaim policy for a new session.
//!
//! Team liveness alone does not prove the coordinator is dead: a live team
//! with a responsive lead must not be pre-empted. The heartbeat written on
//! every block supplies the extra signal.

use chrono::{DateTime, Duration, Utc};

use crate::state::{DispatchState, DispatchStatus};

/// Default heartbeat age after which a coordinator is presumed dead.
pub const DEFAULT_RECLAIM_THRESHOLD_MINUTES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimAction {
    /// Run is not `dispatched`; nothing to do.
    Inactive,
    /// Unclaimed run with a live team: stamp the new session.
    Adopt,
    /// Unclaimed run with no team: leave it alone.
    LeaveUnclaimed,
    /// This session already coordinates the run.
    AlreadyOwned,
    /// Prior coordinator's team is gone: mark the run `stale`.
    MarkStale { previous: String },
    /// Prior coordinator presumed dead: take over.
    Reclaim {
        previous: String,
        /// `None` when the run never recorded a heartbeat.
        heartbeat_age: Option<Duration>,
    },
    /// Another live session is coordinating.
    Skip {
        current: String,
        heartbeat_age: Duration,
    },
}

/// Decide what a new session may do with one dispatch record.
pub fn decide_reclaim(
    state: &DispatchState,
    new_session: &str,
    team_alive: bool,
    now: DateTime<Utc>,
    threshold: Duration,
) -> ReclaimAction {
    if state.status != DispatchStatus::Dispatched {
        return ReclaimAction::Inactive;
    }

    let Some(current) = state.coordinator() else {
        return if team_alive {
            ReclaimAction::Adopt
        } else {
            ReclaimAction::LeaveUnclaimed
        };
    };

    if current == new_session {
        return ReclaimAction::AlreadyOwned;
    }

    if !team_alive {
        return ReclaimAction::MarkStale {
            previous: current.to_string(),
        };
    }

    match heartbeat_age(state, now) {
        None => ReclaimAction::Reclaim {
            previous: current.to_string(),
            heartbeat_age: None,
        },
        Some(age) if age > threshold => ReclaimAction::Reclaim {
            previous: current.to_string(),
            heartbeat_age: Some(age),
        },
        Some(age) => ReclaimAction::Skip {
            current: current.to_string(),
            heartbeat_age: age,
        },
    }
}

/// Age of the recorded heartbeat. Unparseable timestamps count as absent;
/// timestamps in the future count as fresh.
pub fn heartbeat_age(state: &DispatchState, now: DateTime<Utc>) -> Option<Duration> {
    let raw = state.last_heartbeat.as_deref()?;
    let at = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    let age = now.signed_duration_since(at.with_timezone(&Utc));
    Some(age.max(Duration::zero()))
}

/// Render a duration as `15m` / `42s` for status lines.
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds();
    if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
