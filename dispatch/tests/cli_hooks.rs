//! CLI tests for the hook and operator subcommands.
//!
//! Spawns the dispatch binary with a JSON payload on stdin and verifies the
//! stdout/stderr contract and exit codes the host relies on.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use dispatch::exit_codes;
use dispatch::io::config::{ENV_COUNTER_DIR, ENV_MAX_BLOCKS, ENV_PROJECT_ROOT, ENV_TEAMS_DIR};
use dispatch::state::DispatchStatus;
use dispatch::test_support::{TestProject, coordinated_state, group};

fn dispatch_cmd(project: &TestProject, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dispatch"));
    cmd.args(args)
        .current_dir(project.root())
        .env(ENV_PROJECT_ROOT, project.root())
        .env(ENV_TEAMS_DIR, project.teams_dir())
        .env(ENV_COUNTER_DIR, project.counter_dir())
        .env_remove("CLAUDE_CODE_TEAMMATE_NAME")
        .env_remove("CLAUDE_CODE_TEAM_NAME")
        .env_remove("RUST_LOG");
    cmd
}

fn run_with_stdin(mut cmd: Command, stdin: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn dispatch");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait dispatch")
}

fn demo_project() -> TestProject {
    let project = TestProject::new().expect("project");
    project
        .write_state(
            "demo",
            &coordinated_state(vec![group("g1", &["src/a.ts"]), group("g2", &["src/b.ts"])], "S1"),
        )
        .expect("state");
    project.register_team("demo", &["g1", "g2"]).expect("team");
    project
}

#[test]
fn stop_prints_block_decision_and_exits_zero() {
    let project = demo_project();
    let cmd = dispatch_cmd(&project, &["stop", "--team", "demo-parallel"]);

    let output = run_with_stdin(cmd, r#"{"session_id":"S1","stop_hook_active":false}"#);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("block decision json");
    assert_eq!(response["decision"], "block");
    let reason = response["reason"].as_str().expect("reason");
    assert!(reason.contains("0/2"), "{reason}");
    assert!(
        project
            .load_state("demo")
            .expect("load")
            .last_heartbeat
            .is_some()
    );
}

#[test]
fn broken_config_still_honours_environment_overrides() {
    let project = demo_project();
    project
        .write_file(".dispatch/config.toml", "max_blocks = [not toml")
        .expect("config");
    let stop = || {
        let mut cmd = dispatch_cmd(&project, &["stop", "--team", "demo-parallel"]);
        cmd.env(ENV_MAX_BLOCKS, "1");
        run_with_stdin(cmd, r#"{"session_id":"S1","stop_hook_active":true}"#)
    };

    let first = stop();
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let response: serde_json::Value =
        serde_json::from_slice(&first.stdout).expect("block decision json");
    assert_eq!(response["decision"], "block");

    let second = stop();
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    assert!(second.stdout.is_empty(), "{}", String::from_utf8_lossy(&second.stdout));
}

#[test]
fn stop_for_worker_is_silent() {
    let project = demo_project();
    let cmd = dispatch_cmd(
        &project,
        &["stop", "--teammate", "g1", "--team", "demo-parallel"],
    );

    let output = run_with_stdin(cmd, r#"{"session_id":"W1"}"#);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(output.stdout.is_empty());
}

#[test]
fn stop_with_garbage_input_does_not_fail_the_host() {
    let project = demo_project();
    let output = run_with_stdin(dispatch_cmd(&project, &["stop"]), "{not json");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn file_guard_denies_foreign_file_with_exit_two() {
    let project = demo_project();
    let cmd = dispatch_cmd(
        &project,
        &["file-guard", "--teammate", "g1", "--team", "demo-parallel"],
    );
    let payload = serde_json::json!({
        "tool_name": "Write",
        "tool_input": { "file_path": project.root().join("src/b.ts") },
    });

    let output = run_with_stdin(cmd, &payload.to_string());

    assert_eq!(output.status.code(), Some(exit_codes::DENY));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("src/a.ts"), "{stderr}");
}

#[test]
fn file_guard_permits_owned_file() {
    let project = demo_project();
    let cmd = dispatch_cmd(
        &project,
        &["file-guard", "--teammate", "g1", "--team", "demo-parallel"],
    );
    let payload = serde_json::json!({
        "tool_name": "Edit",
        "tool_input": { "file_path": "src/a.ts" },
    });

    let output = run_with_stdin(cmd, &payload.to_string());
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn task_completed_reports_failed_verify_with_exit_two() {
    let project = demo_project();
    project
        .write_tasks(
            "demo",
            "- [ ] 1.1 Add parser\n  - **Verify**: echo parser broken && false\n",
        )
        .expect("tasks");
    let cmd = dispatch_cmd(&project, &["task-completed", "--teammate", "g1"]);
    let payload = serde_json::json!({
        "task_id": "3",
        "task_subject": "1.1 Add parser",
        "team_name": "demo-parallel",
    });

    let output = run_with_stdin(cmd, &payload.to_string());

    assert_eq!(output.status.code(), Some(exit_codes::DENY));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parser broken"), "{stderr}");
}

#[test]
fn validate_accepts_well_formed_state() {
    let project = demo_project();
    let output = dispatch_cmd(&project, &["validate", "--run", "demo"])
        .output()
        .expect("validate");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dispatched"), "{stdout}");
}

#[test]
fn validate_rejects_missing_run() {
    let project = demo_project();
    let output = dispatch_cmd(&project, &["validate", "--run", "ghost"])
        .output()
        .expect("validate");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn lint_exit_codes_follow_severity() {
    let project = demo_project();
    project
        .write_file(
            "clean.md",
            "- [ ] 1.1 Add parser\n  - **Do**: write it\n  - **Files**: src/p.ts\n  - **Verify**: true\n",
        )
        .expect("clean");
    project
        .write_file("bare.md", "- [ ] 1.1 Add parser\n")
        .expect("bare");
    project
        .write_file("headers.md", "## Task 1: Add parser\n")
        .expect("headers");

    for (file, expected) in [
        ("clean.md", exit_codes::OK),
        ("bare.md", exit_codes::WARNINGS),
        ("headers.md", exit_codes::DENY),
    ] {
        let status = dispatch_cmd(&project, &["lint", "--tasks-md", file])
            .status()
            .expect("lint");
        assert_eq!(status.code(), Some(expected), "{file}");
    }
}

#[test]
fn lint_flags_enable_quality_command_checks() {
    let project = demo_project();
    project
        .write_file(
            "compile_only.md",
            "## Quality Commands\n- **Build**: `make`\n- **Test**: `make test`\n\n## Phase 1\n- [ ] 1.1 Add parser\n  - **Do**: write it\n  - **Files**: src/p.c\n  - **Verify**: `make`\n",
        )
        .expect("compile only");
    project
        .write_file(
            "no_section.md",
            "- [ ] 1.1 Add parser\n  - **Do**: write it\n  - **Files**: src/p.c\n  - **Verify**: `make test`\n",
        )
        .expect("no section");

    for (file, flag, expected) in [
        ("compile_only.md", None, exit_codes::OK),
        ("compile_only.md", Some("--check-verify-commands"), exit_codes::DENY),
        ("no_section.md", None, exit_codes::OK),
        ("no_section.md", Some("--require-quality-commands"), exit_codes::WARNINGS),
    ] {
        let mut args = vec!["lint", "--tasks-md", file];
        args.extend(flag);
        let status = dispatch_cmd(&project, &args).status().expect("lint");
        assert_eq!(status.code(), Some(expected), "{file} {flag:?}");
    }
}

#[test]
fn abort_moves_run_to_aborted() {
    let project = demo_project();
    let status = dispatch_cmd(&project, &["abort", "--run", "demo"])
        .status()
        .expect("abort");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(
        project.load_state("demo").expect("load").status,
        DispatchStatus::Aborted
    );

    let status = dispatch_cmd(&project, &["abort", "--run", "demo"])
        .status()
        .expect("abort again");
    assert_eq!(status.code(), Some(exit_codes::INVALID));
}
