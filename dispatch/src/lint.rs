//! `dispatch lint`: format diagnostics for a task list file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::core::task_lint::{LintOptions, LintReport, lint_tasks};
use crate::exit_codes;

/// Lint a task list file. Missing or empty files are errors.
pub fn lint_file(path: &Path, options: &LintOptions) -> Result<LintReport> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    if content.trim().is_empty() {
        bail!("file is empty: {}", path.display());
    }
    Ok(lint_tasks(&content, options))
}

/// Exit code for a lint report: errors beat warnings. A list with no tasks
/// but nothing wrong in it is not valid, yet exits on its warnings alone.
pub fn exit_code(report: &LintReport) -> i32 {
    if !report.valid && !report.errors.is_empty() {
        exit_codes::DENY
    } else if !report.warnings.is_empty() {
        exit_codes::WARNINGS
    } else {
        exit_codes::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lint(content: &str) -> Result<LintReport> {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.md");
        fs::write(&path, content).expect("write");
        lint_file(&path, &LintOptions::default())
    }

    #[test]
    fn clean_list_exits_ok() {
        let report = lint(
            "## Phase 1\n\n- [ ] 1.1 Add parser\n  - **Do**: write it\n  - **Files**: src/p.ts\n  - **Verify**: npm test\n",
        )
        .expect("lint");
        assert_eq!(exit_code(&report), exit_codes::OK);
    }

    #[test]
    fn header_tasks_are_errors() {
        let report = lint("## Task 1: Add parser\n").expect("lint");
        assert_eq!(exit_code(&report), exit_codes::DENY);
    }

    #[test]
    fn missing_fields_are_warnings() {
        let report = lint("- [ ] 1.1 Add parser\n").expect("lint");
        assert!(report.errors.is_empty());
        assert_eq!(exit_code(&report), exit_codes::WARNINGS);
    }

    #[test]
    fn list_without_tasks_is_not_valid_but_exits_ok() {
        let report = lint("# Notes\n\nnothing to do\n").expect("lint");
        assert!(!report.valid);
        assert_eq!(exit_code(&report), exit_codes::OK);
    }

    #[test]
    fn compile_only_verify_denies_when_checked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.md");
        fs::write(
            &path,
            "## Quality Commands\n- **Build**: `cargo build`\n- **Test**: `cargo test`\n\n## Phase 1\n- [ ] 1.1 Add parser\n  - **Do**: x\n  - **Files**: src/p.rs\n  - **Verify**: `cargo build`\n",
        )
        .expect("write");

        let plain = lint_file(&path, &LintOptions::default()).expect("lint");
        assert_eq!(exit_code(&plain), exit_codes::OK);

        let checked = lint_file(
            &path,
            &LintOptions {
                check_verify_commands: true,
                require_quality_commands: true,
            },
        )
        .expect("lint");
        assert_eq!(exit_code(&checked), exit_codes::DENY);
    }

    #[test]
    fn missing_or_empty_file_is_an_error() {
        assert!(lint("  \n").is_err());
        let missing = lint_file(Path::new("/definitely/not/here.md"), &LintOptions::default());
        assert!(missing.is_err());
    }
}
