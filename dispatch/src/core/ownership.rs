//! File-ownership checks for partitioned writers.

use std::path::{Component, Path, PathBuf};

use crate::state::Group;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    Permit,
    Deny { reason: String },
}

/// Normalize `target` relative to `root` into a `/`-separated path.
///
/// Resolution is lexical (`.` and `..` are folded, symlinks are not followed).
/// Paths outside `root` stay absolute.
pub fn normalize_path(root: &Path, target: &Path) -> String {
    let absolute = if target.is_absolute() {
        target.to_path_buf()
    } else {
        root.join(target)
    };
    let absolute = fold_components(&absolute);
    let root = fold_components(root);
    let relative = absolute.strip_prefix(&root).unwrap_or(&absolute);
    to_slash(relative)
}

/// Normalize a file listed in `ownedFiles` (relative to the project root).
pub fn normalize_owned(entry: &str) -> String {
    let trimmed = entry.trim().trim_matches('`');
    to_slash(&fold_components(Path::new(trimmed)))
}

/// Check whether `writer` (owning `group`) may write `relative_path`.
pub fn check_ownership(writer: &str, group: &Group, relative_path: &str) -> WriteDecision {
    let owned: Vec<String> = group.owned_files.iter().map(|f| normalize_owned(f)).collect();
    if owned.iter().any(|file| file == relative_path) {
        return WriteDecision::Permit;
    }
    WriteDecision::Deny {
        reason: deny_reason(writer, relative_path, &owned),
    }
}

fn deny_reason(writer: &str, path: &str, owned: &[String]) -> String {
    let mut msg = format!(
        "File ownership violation: teammate '{writer}' may not write '{path}'. Files owned by '{writer}':"
    );
    if owned.is_empty() {
        msg.push_str("\n  (none)");
    }
    for file in owned {
        msg.push_str(&format!("\n  - {file}"));
    }
    msg.push_str("\nIf this file must change, report it to the lead instead of editing it.");
    msg
}

fn fold_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(files: &[&str]) -> Group {
        Group {
            name: "g1".to_string(),
            owned_files: files.iter().map(|f| f.to_string()).collect(),
            dependencies: Vec::new(),
            tasks: Vec::new(),
            extra: Default::default(),
        }
    }

    #[test]
    fn normalizes_absolute_paths_under_root() {
        let root = Path::new("/work/project");
        assert_eq!(
            normalize_path(root, Path::new("/work/project/src/a.ts")),
            "src/a.ts"
        );
        assert_eq!(
            normalize_path(root, Path::new("/work/project/./src/../src/a.ts")),
            "src/a.ts"
        );
        assert_eq!(normalize_path(root, Path::new("src/a.ts")), "src/a.ts");
    }

    #[test]
    fn paths_outside_root_stay_absolute() {
        let root = Path::new("/work/project");
        assert_eq!(
            normalize_path(root, Path::new("/work/other/a.ts")),
            "/work/other/a.ts"
        );
    }

    #[test]
    fn owned_entries_are_normalized() {
        assert_eq!(normalize_owned("./src/a.ts"), "src/a.ts");
        assert_eq!(normalize_owned("`src/a.ts`"), "src/a.ts");
    }

    #[test]
    fn permits_owned_file() {
        let decision = check_ownership("g1", &group(&["./src/a.ts"]), "src/a.ts");
        assert_eq!(decision, WriteDecision::Permit);
    }

    #[test]
    fn denies_unowned_file_and_lists_owned_files() {
        let decision = check_ownership("g1", &group(&["src/a.ts"]), "src/b.ts");
        let WriteDecision::Deny { reason } = decision else {
            panic!("expected deny");
        };
        assert!(reason.contains("src/b.ts"));
        assert!(reason.contains("- src/a.ts"));
    }

    #[test]
    fn prefix_of_owned_path_is_not_ownership() {
        let decision = check_ownership("g1", &group(&["src/a.ts"]), "src/a.tsx");
        assert!(matches!(decision, WriteDecision::Deny { .. }));
    }
}
