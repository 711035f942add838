//! Test-only helpers: record builders, a scaffolded project and scripted fakes.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use crate::core::types::team_name_for_run;
use crate::io::clock::Clock;
use crate::io::commands::{CommandRequest, CommandResult, CommandRunner};
use crate::io::config::DispatchConfig;
use crate::io::team::TeamRegistry;
use crate::io::workspace::Workspace;
use crate::state::{DispatchState, Group};

/// Fixed `dispatchedAt` used by [`dispatched_state`].
pub const DISPATCHED_AT: &str = "2026-03-01T11:00:00Z";
/// Fixed "now" used by [`FixedClock::default`].
pub const NOW: &str = "2026-03-01T12:00:00Z";

/// A group owning `files`, with no dependencies or tasks.
pub fn group(name: &str, files: &[&str]) -> Group {
    Group {
        name: name.to_string(),
        owned_files: files.iter().map(|f| f.to_string()).collect(),
        dependencies: Vec::new(),
        tasks: Vec::new(),
        extra: Default::default(),
    }
}

/// A `dispatched` record with deterministic identity.
pub fn dispatched_state(groups: Vec<Group>) -> DispatchState {
    DispatchState {
        groups,
        ..DispatchState::dispatched(DISPATCHED_AT)
    }
}

/// Same as [`dispatched_state`] with a coordinator stamped.
pub fn coordinated_state(groups: Vec<Group>, session: &str) -> DispatchState {
    DispatchState {
        coordinator_session_id: Some(session.to_string()),
        ..dispatched_state(groups)
    }
}

pub fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|err| panic!("bad timestamp {raw}: {err}"))
}

/// RFC 3339 timestamp `minutes` before [`NOW`].
pub fn minutes_before_now(minutes: i64) -> String {
    (parse_time(NOW) - Duration::minutes(minutes)).to_rfc3339()
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at(raw: &str) -> Self {
        Self(parse_time(raw))
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(NOW)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// In-memory team registry listing the teams that have live members.
#[derive(Debug, Clone, Default)]
pub struct FakeTeams {
    alive: BTreeSet<String>,
}

impl FakeTeams {
    pub fn none() -> Self {
        Self::default()
    }

    /// Teams for the given run names are alive.
    pub fn alive_runs(runs: &[&str]) -> Self {
        Self {
            alive: runs.iter().map(|run| team_name_for_run(run)).collect(),
        }
    }
}

impl TeamRegistry for FakeTeams {
    fn is_alive(&self, team: &str) -> bool {
        self.alive.contains(team)
    }
}

/// Command runner answering from a script keyed by command line.
///
/// Unscripted commands succeed with empty output. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedCommandRunner {
    failures: Vec<(String, String)>,
    outputs: Vec<(String, String)>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `command` exits non-zero printing `output`.
    pub fn fail(mut self, command: &str, output: &str) -> Self {
        self.failures.push((command.to_string(), output.to_string()));
        self
    }

    /// `command` succeeds printing `output`.
    pub fn succeed_with(mut self, command: &str, output: &str) -> Self {
        self.outputs.push((command.to_string(), output.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandResult> {
        self.calls.borrow_mut().push(request.command_line.clone());
        if let Some((_, output)) = self
            .failures
            .iter()
            .find(|(cmd, _)| cmd == &request.command_line)
        {
            return Ok(CommandResult {
                success: false,
                output: output.clone(),
            });
        }
        let output = self
            .outputs
            .iter()
            .find(|(cmd, _)| cmd == &request.command_line)
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandResult {
            success: true,
            output,
        })
    }
}

/// Temporary project root with its own teams and counter directories.
pub struct TestProject {
    temp: TempDir,
    pub workspace: Workspace,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("project");
        fs::create_dir_all(&root)?;
        let config = DispatchConfig {
            teams_dir: Some(temp.path().join("teams")),
            counter_dir: Some(temp.path().join("counters")),
            ..DispatchConfig::default()
        };
        let workspace = Workspace::new(&root, config);
        Ok(Self { temp, workspace })
    }

    pub fn root(&self) -> &Path {
        &self.workspace.paths.root
    }

    pub fn teams_dir(&self) -> PathBuf {
        self.temp.path().join("teams")
    }

    pub fn counter_dir(&self) -> PathBuf {
        self.temp.path().join("counters")
    }

    pub fn write_state(&self, run: &str, state: &DispatchState) -> Result<()> {
        self.workspace
            .store
            .save(run, state)
            .map_err(|err| anyhow!("{err}"))
    }

    pub fn load_state(&self, run: &str) -> Result<DispatchState> {
        self.workspace.store.load(run).map_err(|err| anyhow!("{err}"))
    }

    pub fn write_tasks(&self, run: &str, contents: &str) -> Result<()> {
        let path = self.workspace.paths.tasks_path(run);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn read_tasks(&self, run: &str) -> Result<String> {
        Ok(fs::read_to_string(self.workspace.paths.tasks_path(run))?)
    }

    /// Write a host team registry entry for `run` with the given members.
    pub fn register_team(&self, run: &str, members: &[&str]) -> Result<()> {
        let dir = self.teams_dir().join(team_name_for_run(run));
        fs::create_dir_all(&dir)?;
        let members: Vec<serde_json::Value> = members
            .iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();
        fs::write(
            dir.join("config.json"),
            serde_json::to_string(&serde_json::json!({ "members": members }))?,
        )?;
        Ok(())
    }

    pub fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
