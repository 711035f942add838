//! `dispatch provenance`: audit commits since dispatch for group sign-offs.
//!
//! An audit, not a gate: failures are reported inside the report.

use tracing::warn;

use crate::core::provenance::{ProvenanceReport, audit_provenance};
use crate::io::git::Git;
use crate::io::paths::validate_run_name;
use crate::io::workspace::Workspace;

pub fn audit_run(ws: &Workspace, run: &str, since: Option<&str>) -> ProvenanceReport {
    if let Err(err) = validate_run_name(run) {
        return ProvenanceReport::failed(err.to_string());
    }
    let state = match ws.store.load(run) {
        Ok(state) => state,
        Err(err) => {
            warn!(run, err = %err, "cannot audit without dispatch state");
            return ProvenanceReport::failed(err.to_string());
        }
    };

    let Some(since) = since.or(state.dispatched_at.as_deref()) else {
        return ProvenanceReport::failed("no --since provided and no dispatchedAt".to_string());
    };
    let commits = match Git::new(&ws.paths.root).log_signoffs(since) {
        Ok(commits) => commits,
        Err(err) => return ProvenanceReport::failed(format!("{err:#}")),
    };
    let groups: Vec<String> = state.groups.iter().map(|g| g.name.clone()).collect();
    audit_provenance(&commits, &groups)
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;
    use crate::core::provenance::Attribution;
    use crate::test_support::{TestProject, dispatched_state, group};

    fn git(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn classifies_commits_against_groups() {
        let project = TestProject::new().expect("project");
        let root = project.root();
        git(root, &["init", "-q"]);
        git(root, &["config", "user.email", "dev@example.com"]);
        git(root, &["config", "user.name", "Dev"]);
        for (subject, trailer) in [
            ("feat: a", Some("g1")),
            ("feat: b", Some("intruder")),
            ("chore: c", None),
        ] {
            let mut args = vec!["commit", "-q", "--allow-empty", "-m", subject];
            let body;
            if let Some(trailer) = trailer {
                body = format!("Signed-off-by: {trailer}");
                args.extend(["-m", body.as_str()]);
            }
            git(root, &args);
        }
        project
            .write_state("demo", &dispatched_state(vec![group("g1", &[])]))
            .expect("state");

        let report = audit_run(&project.workspace, "demo", Some("2000-01-01"));

        assert_eq!(report.error, None);
        assert_eq!(report.total, 3);
        assert_eq!(report.attributed, 1);
        assert_eq!(report.unknown_agent, 1);
        assert_eq!(report.unattributed, 1);
        assert!(
            report
                .details
                .iter()
                .any(|d| d.subject == "feat: a" && d.status == Attribution::Attributed)
        );
    }

    #[test]
    fn no_audit_window_reports_error() {
        let project = TestProject::new().expect("project");
        let mut state = dispatched_state(vec![group("g1", &[])]);
        state.dispatched_at = None;
        project.write_state("demo", &state).expect("state");

        let report = audit_run(&project.workspace, "demo", None);

        assert_eq!(
            report.error.as_deref(),
            Some("no --since provided and no dispatchedAt")
        );
        assert_eq!(report.total, 0);
    }

    #[test]
    fn missing_state_reports_error() {
        let project = TestProject::new().expect("project");
        let report = audit_run(&project.workspace, "ghost", None);
        assert!(report.error.is_some());
        assert_eq!(report.total, 0);
    }
}
