//! Format diagnostics for task lists.
//!
//! The base pass always runs. Two opt-in passes compare the list against its
//! own `## Quality Commands` section: declared-command warnings, and verify
//! commands that only prove compilation.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::tasks::{TaskEntry, parse_tasks};
use crate::state::QualityCommands;

static HEADER_TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{2,3}\s+Task\s+(\d+)[:\s]*(.*)$").expect("header task regex"));
static MISSING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[.\]\s+(\S.*)$").expect("checkbox regex"));
static TASK_ID_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+").expect("task id regex"));
static STAR_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\s*\[.\]\s*\d+\.\d+").expect("star marker regex"));
static GROUP_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###\s+Group\s+\d+:").expect("group heading regex"));
static QUALITY_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^## Quality Commands\b").expect("quality section regex"));
static EXEMPT_VERIFY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(config|docs|documentation|readme|changelog)\b").expect("exempt task regex")
});
static RUNNER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:npx|pnpx|bunx|yarn(?:\s+run)?)\s+").expect("runner prefix regex")
});

const NOT_APPLICABLE: &str = "N/A";

/// Opt-in checks beyond the base format pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintOptions {
    /// Flag verify commands that match build/typecheck but not test.
    pub check_verify_commands: bool,
    /// Warn when `## Quality Commands` is missing or declares no test.
    pub require_quality_commands: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintKind {
    HeaderFormat,
    MissingTaskId,
    WrongListMarker,
    MissingFiles,
    MissingVerify,
    MissingDo,
    GroupMissingFiles,
    MissingQualityCommands,
    NoTestCommand,
    CompileOnlyVerify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    /// 1-indexed; 0 for whole-document issues.
    pub line: usize,
    #[serde(rename = "type")]
    pub kind: LintKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl LintIssue {
    fn document(kind: LintKind, message: &str) -> Self {
        Self {
            line: 0,
            kind,
            message: message.to_string(),
            fix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintReport {
    /// No errors and at least one parseable task.
    pub valid: bool,
    pub task_count: usize,
    pub phase_count: usize,
    pub phases: Vec<u32>,
    pub errors: Vec<LintIssue>,
    pub warnings: Vec<LintIssue>,
    /// `### Group N:` headings with `**Files owned**` annotations.
    pub has_pre_defined_groups: bool,
    /// Commands parsed from `## Quality Commands`, when that pass ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_commands: Option<QualityCommands>,
}

impl LintReport {
    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.valid {
            lines.push(format!(
                "VALID: {} tasks across {} phases",
                self.task_count, self.phase_count
            ));
            if self.has_pre_defined_groups {
                lines.push("  Pre-defined parallel groups: yes".to_string());
            }
        } else {
            lines.push(format!("INVALID: {} format error(s)", self.errors.len()));
            if self.task_count > 0 {
                lines.push(format!("  ({} tasks parsed successfully)", self.task_count));
            }
        }
        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("Errors:".to_string());
            for issue in &self.errors {
                lines.push(format!("  Line {}: {}", issue.line, issue.message));
                if let Some(fix) = &issue.fix {
                    lines.push(format!("    FIX: {fix}"));
                }
            }
        }
        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.push("Warnings:".to_string());
            for issue in &self.warnings {
                if issue.line > 0 {
                    lines.push(format!("  Line {}: {}", issue.line, issue.message));
                } else {
                    lines.push(format!("  {}", issue.message));
                }
            }
        }
        lines.join("\n")
    }
}

/// Lint task-list content.
pub fn lint_tasks(content: &str, options: &LintOptions) -> LintReport {
    let mut errors = line_errors(content);
    let tasks = parse_tasks(content);
    let mut warnings = missing_field_warnings(&tasks);

    let has_groups = GROUP_HEADING_RE.is_match(content);
    let has_files_owned = content.contains("**Files owned**");
    if has_groups && !has_files_owned {
        warnings.push(LintIssue::document(
            LintKind::GroupMissingFiles,
            "Pre-defined groups found but missing **Files owned** annotations",
        ));
    }

    let mut quality_commands = None;
    if options.require_quality_commands || options.check_verify_commands {
        let (declared, section_warnings) = quality_commands_section(content);
        if options.check_verify_commands {
            errors.extend(compile_only_verifies(&tasks, &declared));
        }
        if options.require_quality_commands {
            warnings.extend(section_warnings);
            quality_commands = Some(declared);
        }
    }

    let phases: BTreeSet<u32> = tasks
        .iter()
        .filter_map(|t| t.id.split('.').next()?.parse().ok())
        .collect();

    LintReport {
        valid: errors.is_empty() && !tasks.is_empty(),
        task_count: tasks.len(),
        phase_count: phases.len(),
        phases: phases.into_iter().collect(),
        errors,
        warnings,
        has_pre_defined_groups: has_groups && has_files_owned,
        quality_commands,
    }
}

fn line_errors(content: &str) -> Vec<LintIssue> {
    let mut errors = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(caps) = HEADER_TASK_RE.captures(line) {
            let desc = caps[2].trim().trim_end_matches(':');
            errors.push(LintIssue {
                line: line_no,
                kind: LintKind::HeaderFormat,
                message: "Task uses header format instead of checkbox".to_string(),
                fix: Some(format!("- [ ] {}.1 {}", &caps[1], desc)),
            });
        }
        if let Some(caps) = MISSING_ID_RE.captures(line)
            && !TASK_ID_PREFIX_RE.is_match(&caps[1])
        {
            errors.push(LintIssue {
                line: line_no,
                kind: LintKind::MissingTaskId,
                message: "Checkbox task missing X.Y ID".to_string(),
                fix: None,
            });
        }
        if STAR_MARKER_RE.is_match(line) {
            errors.push(LintIssue {
                line: line_no,
                kind: LintKind::WrongListMarker,
                message: "Uses * instead of - for list marker".to_string(),
                fix: Some(format!("-{}", &line[1..])),
            });
        }
    }
    errors
}

fn missing_field_warnings(tasks: &[TaskEntry]) -> Vec<LintIssue> {
    let mut warnings = Vec::new();
    for task in tasks {
        for (field, kind) in [
            ("Files", LintKind::MissingFiles),
            ("Verify", LintKind::MissingVerify),
            ("Do", LintKind::MissingDo),
        ] {
            if !task.body.contains(&format!("**{field}**:")) {
                warnings.push(LintIssue {
                    line: task.line,
                    kind,
                    message: format!("Task {} missing **{field}**: field", task.id),
                    fix: None,
                });
            }
        }
    }
    warnings
}

/// Parse `## Quality Commands` (up to the next `## ` heading).
///
/// Each of Build, Typecheck, Lint and Test is read from `**Field**: `cmd``
/// or `**Field**: N/A`.
fn quality_commands_section(content: &str) -> (QualityCommands, Vec<LintIssue>) {
    let mut lines = content.lines();
    if !lines.by_ref().any(|line| QUALITY_SECTION_RE.is_match(line)) {
        return (
            QualityCommands::default(),
            vec![LintIssue::document(
                LintKind::MissingQualityCommands,
                "Missing ## Quality Commands section (recommended for dispatch)",
            )],
        );
    }
    let section: Vec<&str> = lines.take_while(|line| !line.starts_with("## ")).collect();

    let declared = QualityCommands {
        build: section_field(&section, "Build"),
        typecheck: section_field(&section, "Typecheck"),
        lint: section_field(&section, "Lint"),
        test: section_field(&section, "Test"),
    };
    let mut warnings = Vec::new();
    if declared.test().is_none() {
        warnings.push(LintIssue::document(
            LintKind::NoTestCommand,
            "Quality Commands: no test command declared (baseline snapshot will be skipped)",
        ));
    }
    (declared, warnings)
}

fn section_field(section: &[&str], name: &str) -> Option<String> {
    let needle = format!("**{name}**:");
    section.iter().find_map(|line| {
        let rest = line[line.find(&needle)? + needle.len()..].trim_start();
        if let Some(quoted) = rest.strip_prefix('`') {
            let command = quoted.split('`').next()?.trim();
            return (!command.is_empty() && quoted.contains('`')).then(|| command.to_string());
        }
        rest.starts_with(NOT_APPLICABLE)
            .then(|| NOT_APPLICABLE.to_string())
    })
}

/// Verify commands that overlap build/typecheck but never the test command.
///
/// Skipped when no test or no compile command is declared. `[VERIFY]`
/// checkpoints and config/docs tasks are exempt.
fn compile_only_verifies(tasks: &[TaskEntry], declared: &QualityCommands) -> Vec<LintIssue> {
    let Some(test) = declared.test() else {
        return Vec::new();
    };
    let compile: Vec<&str> = [declared.build(), declared.typecheck()]
        .into_iter()
        .flatten()
        .collect();
    if compile.is_empty() {
        return Vec::new();
    }

    tasks
        .iter()
        .filter(|task| !task.is_checkpoint() && !EXEMPT_VERIFY_RE.is_match(&task.description))
        .filter_map(|task| {
            let verify = task.verify.as_deref()?;
            let parts: Vec<&str> = verify
                .split("&&")
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect();
            let matches_compile = parts
                .iter()
                .any(|part| compile.iter().any(|cmd| commands_overlap(part, cmd)));
            let matches_test = parts.iter().any(|part| commands_overlap(part, test));
            (matches_compile && !matches_test).then(|| LintIssue {
                line: task.line,
                kind: LintKind::CompileOnlyVerify,
                message: format!(
                    "Task {} Verify matches build/typecheck but not test command",
                    task.id
                ),
                fix: Some(format!("Include test command: `{test}`")),
            })
        })
        .collect()
}

/// Same command after dropping runner prefixes, or one a prefix of the other.
fn commands_overlap(a: &str, b: &str) -> bool {
    let a = RUNNER_PREFIX_RE.replace(a.trim(), "");
    let b = RUNNER_PREFIX_RE.replace(b.trim(), "");
    a.starts_with(b.as_ref()) || b.starts_with(a.as_ref())
}
