//! Semantic invariants not expressible via JSON Schema.

use std::collections::{BTreeMap, HashSet};

use crate::core::ownership::normalize_owned;
use crate::state::{DispatchState, DispatchStatus};

/// Check semantic invariants of a dispatch record:
/// - No duplicate group names
/// - Every owned file belongs to at most one group
/// - `completedGroups` and group `dependencies` name existing groups
/// - A `stale` run records why
pub fn validate_invariants(state: &DispatchState) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for group in &state.groups {
        if group.name.trim().is_empty() {
            errors.push("group with empty name".to_string());
        }
        if !names.insert(group.name.as_str()) {
            errors.push(format!("duplicate group name '{}'", group.name));
        }
    }

    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for group in &state.groups {
        for file in &group.owned_files {
            let file = normalize_owned(file);
            if let Some(previous) = owners.insert(file.clone(), group.name.as_str())
                && previous != group.name
            {
                errors.push(format!(
                    "file '{}' owned by both '{}' and '{}'",
                    file, previous, group.name
                ));
            }
        }
    }

    for completed in &state.completed_groups {
        if !names.contains(completed.as_str()) {
            errors.push(format!("completed group '{completed}' is not a group"));
        }
    }

    for group in &state.groups {
        for dep in &group.dependencies {
            if !names.contains(dep.as_str()) {
                errors.push(format!(
                    "group '{}' depends on unknown group '{}'",
                    group.name, dep
                ));
            }
            if dep == &group.name {
                errors.push(format!("group '{}' depends on itself", group.name));
            }
        }
    }

    if state.status == DispatchStatus::Stale && state.stale_reason.is_none() {
        errors.push("status is stale but staleReason is missing".to_string());
    }

    errors
}
