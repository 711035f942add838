//! Dispatch coordination hooks and operator commands.
//!
//! Hook subcommands read the host's JSON payload from stdin and never fail
//! the host: any internal error degrades to allow/permit/pass. Operator
//! subcommands report errors with exit code 1.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::warn;

use dispatch::core::gate::GateOutcome;
use dispatch::core::ownership::WriteDecision;
use dispatch::core::task_lint::LintOptions;
use dispatch::core::types::HookIdentity;
use dispatch::exit_codes;
use dispatch::file_guard::guard_write;
use dispatch::io::clock::SystemClock;
use dispatch::io::commands::ShellCommandRunner;
use dispatch::io::hook_input::{
    SessionStartInput, StopInput, TaskCompletedInput, ToolUseInput, read_input,
};
use dispatch::io::paths::resolve_root;
use dispatch::io::workspace::Workspace;
use dispatch::stop::{BlockResponse, intercept_stop};
use dispatch::{abort, lint, logging, mark, provenance, quality_gate, reclaim, validate};

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Coordination hooks for partitioned multi-agent dispatches"
)]
struct Cli {
    /// Worker identity (the group this process owns). Empty for the lead.
    #[arg(long, global = true, env = "CLAUDE_CODE_TEAMMATE_NAME")]
    teammate: Option<String>,

    /// Team context of the calling process (`<run>-parallel`).
    #[arg(long, global = true, env = "CLAUDE_CODE_TEAM_NAME")]
    team: Option<String>,

    /// Project root; defaults to the hook's `cwd`, then the current directory.
    #[arg(long, global = true, env = "DISPATCH_PROJECT_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stop hook: print a block decision while the run is unfinished.
    Stop,
    /// Session start hook: adopt or reclaim in-flight runs.
    SessionStart,
    /// Pre-write hook: deny writes outside the worker's owned files.
    FileGuard,
    /// Task-completed hook: run the staged quality gate.
    TaskCompleted,
    /// Check a run's state record against the schema and invariants.
    Validate {
        #[arg(long)]
        run: String,
    },
    /// Check off the tasks of completed groups in the run's task list.
    MarkComplete {
        #[arg(long)]
        run: String,
        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Audit commits since dispatch for group sign-offs (always exits 0).
    Provenance {
        #[arg(long)]
        run: String,
        /// Override the start of the audit window (defaults to `dispatchedAt`).
        #[arg(long)]
        since: Option<String>,
    },
    /// Lint a task list file.
    Lint {
        #[arg(long)]
        tasks_md: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        /// Error on verify commands that only build or typecheck.
        #[arg(long)]
        check_verify_commands: bool,
        /// Warn when `## Quality Commands` is missing or has no test command.
        #[arg(long)]
        require_quality_commands: bool,
    },
    /// Abort an in-flight run and release its coordinator lock.
    Abort {
        #[arg(long)]
        run: String,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let identity = HookIdentity::new(cli.teammate, cli.team);
    let root = cli.root.as_deref();
    match cli.command {
        Command::Stop => Ok(hook_stop(root, &identity)),
        Command::SessionStart => Ok(hook_session_start(root)),
        Command::FileGuard => Ok(hook_file_guard(root, &identity)),
        Command::TaskCompleted => Ok(hook_task_completed(root, &identity)),
        Command::Validate { run } => cmd_validate(root, &run),
        Command::MarkComplete { run, dry_run } => cmd_mark_complete(root, &run, dry_run),
        Command::Provenance { run, since } => cmd_provenance(root, &run, since.as_deref()),
        Command::Lint {
            tasks_md,
            json,
            check_verify_commands,
            require_quality_commands,
        } => cmd_lint(
            &tasks_md,
            json,
            &LintOptions {
                check_verify_commands,
                require_quality_commands,
            },
        ),
        Command::Abort { run } => cmd_abort(root, &run),
    }
}

fn hook_stop(root: Option<&Path>, identity: &HookIdentity) -> i32 {
    let input: StopInput = read_hook_input(std::io::stdin().lock());
    let Some(ws) = hook_workspace(root, input.cwd.as_deref()) else {
        return exit_codes::OK;
    };
    let decision = intercept_stop(&ws, &ws.team_registry(), &SystemClock, identity, &input);
    if let Some(response) = BlockResponse::from_decision(&decision) {
        match serde_json::to_string(&response) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!(err = %err, "failed to serialize block decision"),
        }
    }
    exit_codes::OK
}

fn hook_session_start(root: Option<&Path>) -> i32 {
    let input: SessionStartInput = read_hook_input(std::io::stdin().lock());
    let Some(ws) = hook_workspace(root, input.cwd.as_deref()) else {
        return exit_codes::OK;
    };
    let report = reclaim::reclaim_on_session_start(&ws, &ws.team_registry(), &SystemClock, &input);
    for entry in report.iter().filter(|entry| entry.is_notable()) {
        println!("{entry}");
    }
    exit_codes::OK
}

fn hook_file_guard(root: Option<&Path>, identity: &HookIdentity) -> i32 {
    let input: ToolUseInput = read_hook_input(std::io::stdin().lock());
    let Some(ws) = hook_workspace(root, input.cwd.as_deref()) else {
        return exit_codes::OK;
    };
    match guard_write(&ws, &ws.team_registry(), identity, &input) {
        WriteDecision::Permit => exit_codes::OK,
        WriteDecision::Deny { reason } => {
            eprintln!("{reason}");
            exit_codes::DENY
        }
    }
}

fn hook_task_completed(root: Option<&Path>, identity: &HookIdentity) -> i32 {
    let input: TaskCompletedInput = read_hook_input(std::io::stdin().lock());
    let Some(ws) = hook_workspace(root, input.cwd.as_deref()) else {
        return exit_codes::OK;
    };
    match quality_gate::run_quality_gate(
        &ws,
        &ws.team_registry(),
        &ShellCommandRunner,
        identity,
        &input,
    ) {
        GateOutcome::Pass(_) => exit_codes::OK,
        GateOutcome::Fail(failure) => {
            eprint!("{}", failure.render());
            exit_codes::DENY
        }
    }
}

/// Unreadable or malformed payloads degrade to the default payload.
fn read_hook_input<T, R>(reader: R) -> T
where
    T: DeserializeOwned + Default,
    R: Read,
{
    read_input(reader).unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "unusable hook input");
        T::default()
    })
}

fn hook_workspace(root: Option<&Path>, cwd: Option<&Path>) -> Option<Workspace> {
    match resolve_root(root, cwd) {
        Ok(root) => Some(Workspace::open_or_default(root)),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "no project root");
            None
        }
    }
}

fn operator_workspace(root: Option<&Path>) -> Result<Workspace> {
    Workspace::open(resolve_root(root, None)?)
}

fn cmd_validate(root: Option<&Path>, run: &str) -> Result<i32> {
    let ws = operator_workspace(root)?;
    let state = validate::validate_run(&ws, run)?;
    println!(
        "ok: dispatch '{run}' is {} with {} group(s), {} completed",
        state.status.label(),
        state.groups.len(),
        state.completed_count()
    );
    Ok(exit_codes::OK)
}

fn cmd_mark_complete(root: Option<&Path>, run: &str, dry_run: bool) -> Result<i32> {
    let ws = operator_workspace(root)?;
    let report = mark::mark_completed_tasks(&ws, run, dry_run)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(exit_codes::OK)
}

fn cmd_provenance(root: Option<&Path>, run: &str, since: Option<&str>) -> Result<i32> {
    let ws = operator_workspace(root)?;
    let report = provenance::audit_run(&ws, run, since);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(exit_codes::OK)
}

fn cmd_lint(tasks_md: &Path, json: bool, options: &LintOptions) -> Result<i32> {
    let report = lint::lint_file(tasks_md, options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(lint::exit_code(&report))
}

fn cmd_abort(root: Option<&Path>, run: &str) -> Result<i32> {
    let ws = operator_workspace(root)?;
    let state = abort::abort_run(&ws, &SystemClock, run)?;
    println!(
        "aborted dispatch '{run}' at {}",
        state.aborted_at.as_deref().unwrap_or("unknown time")
    );
    Ok(exit_codes::OK)
}
