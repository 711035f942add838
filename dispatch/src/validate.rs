//! `dispatch validate`: schema conformance plus semantic invariants.

use std::fs;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::invariants::validate_invariants;
use crate::io::paths::validate_run_name;
use crate::io::workspace::Workspace;
use crate::state::DispatchState;

pub const STATE_SCHEMA: &str = include_str!("../schemas/dispatch_state.v1.schema.json");

/// Validate one run's state record. Returns the parsed record on success.
pub fn validate_run(ws: &Workspace, run: &str) -> Result<DispatchState> {
    validate_run_name(run)?;
    let path = ws.paths.state_path(run);
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    validate_state(&raw).with_context(|| format!("validate {}", path.display()))
}

/// Parse and validate a raw state record: schema, then invariants.
pub fn validate_state(raw: &str) -> Result<DispatchState> {
    let instance: Value = serde_json::from_str(raw).context("parse state json")?;
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse state schema")?;
    validate_schema(&instance, &schema)?;
    let state: DispatchState = serde_json::from_value(instance).context("parse state record")?;
    let errors = validate_invariants(&state);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(state)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
