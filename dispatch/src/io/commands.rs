//! Quality command runner adapter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::io::process::run_shell;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command_line: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CommandRequest {
    pub fn new(
        command_line: &str,
        workdir: &Path,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            command_line: command_line.to_string(),
            workdir: workdir.to_path_buf(),
            timeout,
            output_limit_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

pub trait CommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandResult>;
}

/// Runs command lines through `sh -c`.
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandResult> {
        let output = run_shell(
            &request.command_line,
            &request.workdir,
            request.timeout,
            request.output_limit_bytes,
        )?;
        Ok(CommandResult {
            success: output.success(),
            output: output.combined_text("command"),
        })
    }
}
