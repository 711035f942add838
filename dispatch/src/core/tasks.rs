//! Task list (`tasks.md`) parsing and checkbox marking.
//!
//! Items look like `- [ ] 1.2 [P] description` followed by an indented body
//! with `**Files**:`, `**Verify**:` and friends. A body ends at the next item
//! or at a `## ` heading.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[(.)\]\s*(\d+\.\d+)\s*(.*)$").expect("task item regex"));

const MARKERS: [&str; 2] = ["[P]", "[VERIFY]"];

/// One parsed task item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: String,
    pub description: String,
    pub completed: bool,
    /// Markers such as `P` and `VERIFY`, without brackets.
    pub markers: Vec<String>,
    pub files: Vec<String>,
    pub verify: Option<String>,
    /// 1-indexed line of the checkbox item.
    pub line: usize,
    pub body: String,
}

impl TaskEntry {
    pub fn is_checkpoint(&self) -> bool {
        self.markers.iter().any(|m| m == "VERIFY")
    }
}

/// Parsed task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    pub tasks: Vec<TaskEntry>,
}

impl TaskList {
    pub fn parse(content: &str) -> Self {
        Self {
            tasks: parse_tasks(content),
        }
    }

    pub fn incomplete_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn find(&self, id: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Parse every checkbox task item in document order.
pub fn parse_tasks(content: &str) -> Vec<TaskEntry> {
    let lines: Vec<&str> = content.lines().collect();
    let mut tasks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = ITEM_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let completed = caps[1].eq_ignore_ascii_case("x");
        let id = caps[2].to_string();
        let (description, markers) = strip_markers(&caps[3]);
        let line = i + 1;

        i += 1;
        let start = i;
        while i < lines.len() && !ends_body(lines[i]) {
            i += 1;
        }
        let body = lines[start..i].join("\n");

        tasks.push(TaskEntry {
            id,
            description,
            completed,
            markers,
            files: extract_files(&body),
            verify: extract_field(&body, "Verify"),
            line,
            body,
        });
    }

    tasks
}

/// True if `line` terminates a task body.
pub fn ends_body(line: &str) -> bool {
    ITEM_RE.is_match(line) || line.starts_with("## ")
}

fn strip_markers(rest: &str) -> (String, Vec<String>) {
    let mut description = rest.trim().to_string();
    let mut markers = Vec::new();
    for marker in MARKERS {
        if description.contains(marker) {
            markers.push(marker.trim_matches(['[', ']']).to_string());
            description = description.replace(marker, "").trim().to_string();
        }
    }
    (description, markers)
}

/// Extract the comma-separated `**Files**:` list.
pub fn extract_files(body: &str) -> Vec<String> {
    let Some(raw) = field_line(body, "Files") else {
        return Vec::new();
    };
    raw.split(',')
        .map(|part| part.trim().trim_matches('`').trim().to_string())
        .filter(|file| !file.is_empty())
        .collect()
}

/// Extract a single-line field such as `**Verify**:` (backticks stripped).
pub fn extract_field(body: &str, name: &str) -> Option<String> {
    let raw = field_line(body, name)?;
    let value = raw.trim().trim_matches('`').trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn field_line<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("**{name}**:");
    body.lines().find_map(|line| {
        let idx = line.find(&needle)?;
        Some(&line[idx + needle.len()..])
    })
}

/// Counts reported by [`mark_complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReport {
    pub marked: usize,
    pub already_complete: usize,
    pub not_found: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Flip `- [ ] <id>` to `- [x] <id>` for every id. Idempotent.
pub fn mark_complete(content: &str, ids: &[String]) -> (String, MarkReport) {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let mut report = MarkReport::default();

    for id in ids {
        let mut matched = false;
        let mut already = false;
        for line in &mut lines {
            let Some(caps) = ITEM_RE.captures(line) else {
                continue;
            };
            if &caps[2] != id.as_str() {
                continue;
            }
            if caps[1].eq_ignore_ascii_case("x") {
                already = true;
                continue;
            }
            if &caps[1] == " " {
                line.replace_range(3..4, "x");
                report.marked += 1;
                matched = true;
            }
        }
        if !matched {
            if already {
                report.already_complete += 1;
            } else {
                report.not_found += 1;
            }
        }
    }

    let mut updated = lines.join("\n");
    if content.ends_with('\n') {
        updated.push('\n');
    }
    (updated, report)
}
