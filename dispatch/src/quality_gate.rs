//! Quality Gate: staged verification of a worker's completed unit.
//!
//! Stages run in order and short-circuit on the first failure:
//! unit verify, typecheck, file existence, periodic build, periodic
//! regression test. The state record is read once up front and never held
//! open while commands run.

use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::core::gate::{
    GateFailure, GateOutcome, GateStage, PassReason, extract_unit_id, regression_against_baseline,
    should_run_periodic, tail_lines,
};
use crate::core::resolve::{Claimant, resolve_run};
use crate::core::types::{HookIdentity, run_name_for_team};
use crate::io::commands::{CommandRequest, CommandRunner};
use crate::io::gate_counter::{GateCounter, GateCounterFile};
use crate::io::hook_input::TaskCompletedInput;
use crate::io::paths::validate_run_name;
use crate::io::task_list::load_task_list;
use crate::io::team::TeamRegistry;
use crate::io::workspace::{ScannedRun, Workspace};
use crate::state::DispatchState;

#[instrument(skip_all, fields(task = input.task_id.as_deref().unwrap_or("")))]
pub fn run_quality_gate(
    ws: &Workspace,
    teams: &dyn TeamRegistry,
    runner: &dyn CommandRunner,
    identity: &HookIdentity,
    input: &TaskCompletedInput,
) -> GateOutcome {
    let Some(run) = resolve_gate_run(ws, teams, identity, input) else {
        debug!("no run for completed task");
        return GateOutcome::Pass(PassReason::NothingToCheck);
    };
    let state = match ws.store.try_load(&run) {
        Ok(Some(state)) if !state.status.is_terminal() => state,
        Ok(_) => return GateOutcome::Pass(PassReason::NothingToCheck),
        Err(err) => {
            warn!(run, err = %err, "state unreadable");
            return GateOutcome::Pass(PassReason::NothingToCheck);
        }
    };
    let Some(unit_id) = input.task_subject.as_deref().and_then(extract_unit_id) else {
        debug!(run, "subject carries no unit id");
        return GateOutcome::Pass(PassReason::NothingToCheck);
    };

    let gate = Gate {
        ws,
        runner,
        state: &state,
        unit_id,
    };
    let counter_file = GateCounterFile::new(ws.paths.gate_counter_path(&run));
    let completed = counter_file
        .load()
        .effective_completed(&state)
        .saturating_add(1);
    match gate.run(&run, completed) {
        Ok(()) => {
            let counter = GateCounter {
                completed,
                last_unit: Some(unit_id.to_string()),
                dispatched_at_seen: state.dispatched_at.clone(),
            };
            if let Err(err) = counter_file.save(&counter) {
                warn!(run, err = %format!("{err:#}"), "failed to persist gate counter");
            }
            debug!(run, unit = unit_id, completed, "unit admitted");
            GateOutcome::Pass(PassReason::Verified)
        }
        Err(failure) => {
            debug!(run, unit = unit_id, stage = %failure.stage, "unit rejected");
            GateOutcome::Fail(failure)
        }
    }
}

fn resolve_gate_run(
    ws: &Workspace,
    teams: &dyn TeamRegistry,
    identity: &HookIdentity,
    input: &TaskCompletedInput,
) -> Option<String> {
    let team_run = input
        .team_name
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(run_name_for_team)
        .or_else(|| identity.team_run());
    let run = match (team_run, identity.teammate.as_deref()) {
        (Some(run), _) => run,
        (None, Some(writer)) => {
            let scanned = ws.scan(teams);
            let candidates: Vec<_> = scanned.iter().map(ScannedRun::candidate).collect();
            resolve_run(None, Claimant::Writer(writer), &candidates)
                .run()?
                .to_string()
        }
        (None, None) => return None,
    };
    match validate_run_name(&run) {
        Ok(()) => Some(run),
        Err(err) => {
            warn!(run, err = %err, "ignoring unusable run name");
            None
        }
    }
}

struct Gate<'a> {
    ws: &'a Workspace,
    runner: &'a dyn CommandRunner,
    state: &'a DispatchState,
    unit_id: &'a str,
}

impl Gate<'_> {
    fn run(&self, run: &str, completed: u32) -> Result<(), GateFailure> {
        let tasks = match load_task_list(&self.ws.paths.tasks_path(run)) {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(run, err = %format!("{err:#}"), "task list unreadable, skipping unit stages");
                Default::default()
            }
        };
        let task = tasks.find(self.unit_id);

        if let Some(verify) = task.and_then(|t| t.verify.as_deref()) {
            self.command(GateStage::UnitVerify, verify)?;
        } else {
            debug!(unit = self.unit_id, "no verify command declared");
        }

        if let Some(typecheck) = self.state.quality_commands.typecheck() {
            self.command(GateStage::Typecheck, typecheck)?;
        }

        if let Some(task) = task {
            self.files_exist(&task.files)?;
        }

        let config = &self.ws.config;
        if let Some(build) = self.state.quality_commands.build()
            && should_run_periodic(completed, config.build_every)
        {
            self.command(GateStage::Build, build)?;
        }

        if let Some(test) = self.state.quality_commands.test()
            && should_run_periodic(completed, config.test_every)
        {
            let output = self.command(GateStage::RegressionTest, test)?;
            let baseline = self
                .state
                .baseline_snapshot
                .as_ref()
                .and_then(|b| b.known_test_count());
            if let Some(message) = regression_against_baseline(baseline, &output) {
                return Err(self.failure(
                    GateStage::RegressionTest,
                    &format!("{message}\n{output}"),
                ));
            }
        }

        Ok(())
    }

    /// Run one command; on success return its output for further checks.
    fn command(&self, stage: GateStage, command_line: &str) -> Result<String, GateFailure> {
        let config = &self.ws.config;
        let request = CommandRequest::new(
            command_line,
            &self.ws.paths.root,
            config.command_timeout(),
            config.output_limit_bytes,
        );
        debug!(stage = %stage, command = command_line, "running gate command");
        match self.runner.run(&request) {
            Ok(result) if result.success => Ok(result.output),
            Ok(result) => Err(self.failure(
                stage,
                &format!("$ {command_line}\n{}", result.output),
            )),
            Err(err) => Err(self.failure(
                stage,
                &format!("$ {command_line}\nfailed to run: {err:#}"),
            )),
        }
    }

    fn files_exist(&self, files: &[String]) -> Result<(), GateFailure> {
        let missing: Vec<&str> = files
            .iter()
            .map(String::as_str)
            .filter(|file| !exists_under(&self.ws.paths.root, file))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let mut output = String::from("Missing files:");
        for file in missing {
            output.push_str(&format!("\n  - {file}"));
        }
        Err(self.failure(GateStage::FileExistence, &output))
    }

    fn failure(&self, stage: GateStage, output: &str) -> GateFailure {
        GateFailure {
            stage,
            unit_id: self.unit_id.to_string(),
            output: tail_lines(output, self.ws.config.output_tail_lines),
        }
    }
}

fn exists_under(root: &Path, file: &str) -> bool {
    let path = Path::new(file);
    if path.is_absolute() {
        path.exists()
    } else {
        root.join(path).exists()
    }
}
