//! Quality gate planning: stages, cadence, output truncation, regressions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Default cadence for the periodic build stage.
pub const DEFAULT_BUILD_EVERY: u32 = 3;
/// Default cadence for the periodic regression test stage.
pub const DEFAULT_TEST_EVERY: u32 = 2;
/// Default number of output lines surfaced on failure.
pub const DEFAULT_TAIL_LINES: usize = 40;

static UNIT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+\.\d+)\b").expect("unit id regex"));

static PASSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(?:tests?\s+)?pass(?:ed|ing)?\b").expect("passed count regex")
});

/// Gate stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    UnitVerify,
    Typecheck,
    FileExistence,
    Build,
    RegressionTest,
}

impl GateStage {
    pub fn label(self) -> &'static str {
        match self {
            GateStage::UnitVerify => "unit verify",
            GateStage::Typecheck => "typecheck",
            GateStage::FileExistence => "file existence",
            GateStage::Build => "build",
            GateStage::RegressionTest => "regression test",
        }
    }

    fn advice(self) -> &'static str {
        match self {
            GateStage::UnitVerify => {
                "Your new code does not pass this task's verify command. Fix it and retry."
            }
            GateStage::Typecheck => "The project no longer typechecks. Fix the type errors and retry.",
            GateStage::FileExistence => {
                "The task declares files that do not exist. Create them (or fix the paths) and retry."
            }
            GateStage::Build => "The project build is broken. Fix the build and retry.",
            GateStage::RegressionTest => {
                "You broke existing behavior: the project test suite fails. Fix the regression and retry."
            }
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why the gate passed (for logs and status output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// No run or no task id to check.
    NothingToCheck,
    /// All applicable stages passed.
    Verified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateFailure {
    pub stage: GateStage,
    pub unit_id: String,
    /// Already truncated to the configured tail.
    pub output: String,
}

impl GateFailure {
    /// Feedback surfaced to the worker.
    pub fn render(&self) -> String {
        let mut msg = format!(
            "Quality gate failed for task {} at stage: {}\n{}\n",
            self.unit_id,
            self.stage,
            self.stage.advice()
        );
        if !self.output.trim().is_empty() {
            msg.push_str("\n--- output (tail) ---\n");
            msg.push_str(self.output.trim_end());
            msg.push('\n');
        }
        msg
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass(PassReason),
    Fail(GateFailure),
}

/// Extract the `X.Y` unit id that must prefix a completed-task subject.
pub fn extract_unit_id(subject: &str) -> Option<&str> {
    UNIT_ID_RE
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Periodic stages run on the first completed unit and every `every`th one.
pub fn should_run_periodic(completed_unit: u32, every: u32) -> bool {
    completed_unit == 1 || (every > 0 && completed_unit % every == 0)
}

/// Keep the last `max_lines` lines of `output`.
pub fn tail_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    let dropped = lines.len() - max_lines;
    let mut buf = format!("[... {dropped} earlier lines truncated]\n");
    buf.push_str(&lines[dropped..].join("\n"));
    buf
}

/// Best-effort passing-test count from a test runner's output (last match wins).
pub fn parse_passed_count(output: &str) -> Option<u64> {
    PASSED_RE
        .captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .last()
}

/// Regression message when the suite passes but fewer tests pass than before the run.
pub fn regression_against_baseline(baseline: Option<u64>, output: &str) -> Option<String> {
    let baseline = baseline?;
    let current = parse_passed_count(output)?;
    if current < baseline {
        return Some(format!(
            "passing test count dropped from {baseline} (baseline) to {current}; tests were removed or skipped"
        ));
    }
    None
}
