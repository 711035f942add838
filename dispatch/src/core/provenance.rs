//! Commit provenance audit via `Signed-off-by` trailers.

use std::collections::BTreeSet;

use serde::Serialize;

/// Record separator emitted by the `git log` format used in `io::git`.
pub const RECORD_SEPARATOR: char = '\u{0}';

/// One commit with its `Signed-off-by` trailer values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub subject: String,
    pub signed_off_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    Attributed,
    Unattributed,
    UnknownAgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAudit {
    pub hash: String,
    pub subject: String,
    pub status: Attribution,
    pub trailer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceReport {
    pub total: usize,
    pub attributed: usize,
    pub unattributed: usize,
    pub unknown_agent: usize,
    pub details: Vec<CommitAudit>,
    /// Set when the commit log could not be read; counts are then zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProvenanceReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Parse `git log --format=%x00%H %s%n%(trailers:key=Signed-off-by,valueonly)`.
pub fn parse_git_log(output: &str) -> Vec<CommitRecord> {
    output
        .split(RECORD_SEPARATOR)
        .filter_map(|record| {
            let mut lines = record.trim().lines();
            let first = lines.next()?.trim();
            if first.is_empty() {
                return None;
            }
            let (hash, subject) = first.split_once(' ').unwrap_or((first, ""));
            let signed_off_by = lines
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            Some(CommitRecord {
                hash: hash.to_string(),
                subject: subject.to_string(),
                signed_off_by,
            })
        })
        .collect()
}

/// Classify commits against the dispatch's group names.
pub fn audit_provenance(commits: &[CommitRecord], groups: &[String]) -> ProvenanceReport {
    let known: BTreeSet<&str> = groups.iter().map(String::as_str).collect();
    let mut report = ProvenanceReport {
        total: commits.len(),
        ..ProvenanceReport::default()
    };

    for commit in commits {
        let short: String = commit.hash.chars().take(8).collect();
        let matched = commit
            .signed_off_by
            .iter()
            .find(|trailer| known.contains(trailer.as_str()));
        let (status, trailer) = match (matched, commit.signed_off_by.first()) {
            (Some(trailer), _) => (Attribution::Attributed, Some(trailer.clone())),
            (None, Some(first)) => (Attribution::UnknownAgent, Some(first.clone())),
            (None, None) => (Attribution::Unattributed, None),
        };
        match status {
            Attribution::Attributed => report.attributed += 1,
            Attribution::UnknownAgent => report.unknown_agent += 1,
            Attribution::Unattributed => report.unattributed += 1,
        }
        report.details.push(CommitAudit {
            hash: short,
            subject: commit.subject.clone(),
            status,
            trailer,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_with_and_without_trailers() {
        let output = "\u{0}abc123def456 feat: parser\ng1\n\n\u{0}fff000111222 chore: lead\n\n";
        let commits = parse_git_log(output);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc123def456");
        assert_eq!(commits[0].subject, "feat: parser");
        assert_eq!(commits[0].signed_off_by, vec!["g1"]);
        assert!(commits[1].signed_off_by.is_empty());
    }

    #[test]
    fn classifies_each_commit() {
        let commits = vec![
            CommitRecord {
                hash: "aaaaaaaaaaaa".to_string(),
                subject: "one".to_string(),
                signed_off_by: vec!["someone".to_string(), "g1".to_string()],
            },
            CommitRecord {
                hash: "bbbbbbbbbbbb".to_string(),
                subject: "two".to_string(),
                signed_off_by: vec!["stranger".to_string()],
            },
            CommitRecord {
                hash: "cccccccccccc".to_string(),
                subject: "three".to_string(),
                signed_off_by: Vec::new(),
            },
        ];
        let report = audit_provenance(&commits, &["g1".to_string()]);
        assert_eq!(report.total, 3);
        assert_eq!(report.attributed, 1);
        assert_eq!(report.unknown_agent, 1);
        assert_eq!(report.unattributed, 1);
        assert_eq!(report.details[0].hash, "aaaaaaaa");
        assert_eq!(report.details[0].trailer.as_deref(), Some("g1"));
        assert_eq!(report.details[1].trailer.as_deref(), Some("stranger"));
    }
}
