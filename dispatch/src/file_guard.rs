//! File-Ownership Guard: admits or denies a worker's file write.
//!
//! Fail-open: with no writer identity, no run, or no group named after the
//! writer there is no partition to protect.

use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::core::ownership::{WriteDecision, check_ownership, normalize_path};
use crate::core::resolve::{Claimant, resolve_run};
use crate::core::types::HookIdentity;
use crate::io::hook_input::ToolUseInput;
use crate::io::paths::validate_run_name;
use crate::io::team::TeamRegistry;
use crate::io::workspace::{ScannedRun, Workspace};

#[instrument(skip_all, fields(writer = identity.teammate.as_deref().unwrap_or("")))]
pub fn guard_write(
    ws: &Workspace,
    teams: &dyn TeamRegistry,
    identity: &HookIdentity,
    input: &ToolUseInput,
) -> WriteDecision {
    let Some(writer) = identity.teammate.as_deref() else {
        return WriteDecision::Permit;
    };
    if !input.is_write() {
        return WriteDecision::Permit;
    }
    let Some(target) = input.tool_input.file_path.as_deref() else {
        debug!("write without file_path");
        return WriteDecision::Permit;
    };

    let team_run = identity.team_run();
    let scanned: Vec<ScannedRun> = if team_run.is_some() {
        Vec::new()
    } else {
        ws.scan(teams)
    };
    let candidates: Vec<_> = scanned.iter().map(ScannedRun::candidate).collect();
    let resolution = resolve_run(team_run.as_deref(), Claimant::Writer(writer), &candidates);
    let Some(run) = resolution.run() else {
        debug!("no run for writer");
        return WriteDecision::Permit;
    };
    if let Err(err) = validate_run_name(run) {
        warn!(run, err = %err, "ignoring unusable run name");
        return WriteDecision::Permit;
    }

    let state = match ws.store.try_load(run) {
        Ok(Some(state)) => state,
        Ok(None) => return WriteDecision::Permit,
        Err(err) => {
            warn!(run, err = %err, "state unreadable");
            return WriteDecision::Permit;
        }
    };
    if state.status.is_terminal() {
        debug!(run, status = state.status.label(), "run is over");
        return WriteDecision::Permit;
    }
    let Some(group) = state.group(writer) else {
        debug!(run, "writer owns no group");
        return WriteDecision::Permit;
    };

    let relative = normalize_path(&ws.paths.root, Path::new(target));
    let decision = check_ownership(writer, group, &relative);
    if let WriteDecision::Deny { .. } = &decision {
        debug!(run, path = %relative, "denying write outside partition");
    }
    decision
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::io::hook_input::ToolInput;
    use crate::state::DispatchStatus;
    use crate::test_support::{FakeTeams, TestProject, coordinated_state, group};

    fn write(path: impl Into<PathBuf>) -> ToolUseInput {
        ToolUseInput {
            tool_name: Some("Write".to_string()),
            tool_input: ToolInput {
                file_path: Some(path.into()),
            },
            cwd: None,
        }
    }

    fn worker(name: &str) -> HookIdentity {
        HookIdentity::new(Some(name.to_string()), Some("demo-parallel".to_string()))
    }

    fn project() -> TestProject {
        let project = TestProject::new().expect("project");
        project
            .write_state(
                "demo",
                &coordinated_state(
                    vec![group("g1", &["src/a.ts"]), group("g2", &["src/b.ts"])],
                    "S1",
                ),
            )
            .expect("state");
        project
    }

    #[test]
    fn permits_owned_absolute_and_relative_paths() {
        let project = project();
        let teams = FakeTeams::alive_runs(&["demo"]);
        let absolute = project.root().join("src/a.ts");

        assert_eq!(
            guard_write(&project.workspace, &teams, &worker("g1"), &write(absolute)),
            WriteDecision::Permit
        );
        assert_eq!(
            guard_write(&project.workspace, &teams, &worker("g1"), &write("./src/a.ts")),
            WriteDecision::Permit
        );
    }

    #[test]
    fn denies_paths_owned_by_others_or_outside_root() {
        let project = project();
        let teams = FakeTeams::alive_runs(&["demo"]);

        let decision = guard_write(&project.workspace, &teams, &worker("g1"), &write("src/b.ts"));
        let WriteDecision::Deny { reason } = decision else {
            panic!("expected deny");
        };
        assert!(reason.contains("src/b.ts"));
        assert!(reason.contains("- src/a.ts"));

        let decision = guard_write(
            &project.workspace,
            &teams,
            &worker("g1"),
            &write("/etc/passwd"),
        );
        assert!(matches!(decision, WriteDecision::Deny { .. }));
    }

    #[test]
    fn fails_open_without_context() {
        let project = project();
        let teams = FakeTeams::alive_runs(&["demo"]);

        let lead = HookIdentity::new(None, Some("demo-parallel".to_string()));
        assert_eq!(
            guard_write(&project.workspace, &teams, &lead, &write("src/b.ts")),
            WriteDecision::Permit
        );
        assert_eq!(
            guard_write(&project.workspace, &teams, &worker("g9"), &write("src/b.ts")),
            WriteDecision::Permit
        );
        let mut read = write("src/b.ts");
        read.tool_name = Some("Read".to_string());
        assert_eq!(
            guard_write(&project.workspace, &teams, &worker("g1"), &read),
            WriteDecision::Permit
        );
    }

    #[test]
    fn scan_fallback_requires_live_team() {
        let project = project();
        let no_team = HookIdentity::new(Some("g1".to_string()), None);

        let decision = guard_write(
            &project.workspace,
            &FakeTeams::alive_runs(&["demo"]),
            &no_team,
            &write("src/b.ts"),
        );
        assert!(matches!(decision, WriteDecision::Deny { .. }));

        let decision = guard_write(
            &project.workspace,
            &FakeTeams::none(),
            &no_team,
            &write("src/b.ts"),
        );
        assert_eq!(decision, WriteDecision::Permit);
    }

    #[test]
    fn terminal_run_permits() {
        let project = project();
        let mut state = project.load_state("demo").expect("load");
        state.status = DispatchStatus::Aborted;
        project.write_state("demo", &state).expect("state");

        assert_eq!(
            guard_write(
                &project.workspace,
                &FakeTeams::alive_runs(&["demo"]),
                &worker("g1"),
                &write("src/b.ts")
            ),
            WriteDecision::Permit
        );
    }
}
