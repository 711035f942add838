//! Dispatch configuration stored under `.dispatch/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::warn;

use crate::core::gate::{DEFAULT_BUILD_EVERY, DEFAULT_TAIL_LINES, DEFAULT_TEST_EVERY};
use crate::core::reclaim_policy::DEFAULT_RECLAIM_THRESHOLD_MINUTES;
use crate::core::stop_policy::DEFAULT_MAX_BLOCKS;

pub const ENV_PROJECT_ROOT: &str = "DISPATCH_PROJECT_ROOT";
pub const ENV_MAX_BLOCKS: &str = "DISPATCH_MAX_BLOCKS";
pub const ENV_RECLAIM_THRESHOLD_MINUTES: &str = "DISPATCH_RECLAIM_THRESHOLD_MINUTES";
pub const ENV_BUILD_EVERY: &str = "DISPATCH_BUILD_EVERY";
pub const ENV_TEST_EVERY: &str = "DISPATCH_TEST_EVERY";
pub const ENV_COMMAND_TIMEOUT_SECS: &str = "DISPATCH_COMMAND_TIMEOUT_SECS";
pub const ENV_TEAMS_DIR: &str = "DISPATCH_TEAMS_DIR";
pub const ENV_COUNTER_DIR: &str = "DISPATCH_COUNTER_DIR";

/// Dispatch configuration (TOML).
///
/// Missing fields take defaults; environment knobs override the file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Consecutive blocks allowed per (run, session) before the lead may stop.
    pub max_blocks: u32,

    /// Heartbeat age after which a coordinator is presumed dead.
    pub reclaim_threshold_minutes: u32,

    /// Run the build stage on the first and every Nth completed unit.
    pub build_every: u32,

    /// Run the regression test stage on the first and every Mth completed unit.
    pub test_every: u32,

    /// Wall-clock budget for each quality command.
    pub command_timeout_secs: u64,

    /// Lines of failing output surfaced to the worker.
    pub output_tail_lines: usize,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Team registry root. Defaults to `$HOME/.claude/teams`.
    pub teams_dir: Option<PathBuf>,

    /// Block counter directory. Defaults to `<tmp>/dispatch-stop`.
    pub counter_dir: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_blocks: DEFAULT_MAX_BLOCKS,
            reclaim_threshold_minutes: DEFAULT_RECLAIM_THRESHOLD_MINUTES,
            build_every: DEFAULT_BUILD_EVERY,
            test_every: DEFAULT_TEST_EVERY,
            command_timeout_secs: 600,
            output_tail_lines: DEFAULT_TAIL_LINES,
            output_limit_bytes: 1_000_000,
            teams_dir: None,
            counter_dir: None,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_blocks == 0 {
            return Err(anyhow!("max_blocks must be > 0"));
        }
        if self.reclaim_threshold_minutes == 0 {
            return Err(anyhow!("reclaim_threshold_minutes must be > 0"));
        }
        if self.build_every == 0 {
            return Err(anyhow!("build_every must be > 0"));
        }
        if self.test_every == 0 {
            return Err(anyhow!("test_every must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_tail_lines == 0 {
            return Err(anyhow!("output_tail_lines must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn reclaim_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.reclaim_threshold_minutes))
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.command_timeout_secs)
    }

    pub fn teams_dir(&self) -> PathBuf {
        self.teams_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir)
                .join(".claude")
                .join("teams")
        })
    }

    pub fn counter_dir(&self) -> PathBuf {
        self.counter_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dispatch-stop"))
    }
}

/// Apply environment knobs. `lookup` is `std::env::var` in production.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides<F>(cfg: &mut DispatchConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    override_number(&lookup, ENV_MAX_BLOCKS, &mut cfg.max_blocks);
    override_number(
        &lookup,
        ENV_RECLAIM_THRESHOLD_MINUTES,
        &mut cfg.reclaim_threshold_minutes,
    );
    override_number(&lookup, ENV_BUILD_EVERY, &mut cfg.build_every);
    override_number(&lookup, ENV_TEST_EVERY, &mut cfg.test_every);
    override_number(&lookup, ENV_COMMAND_TIMEOUT_SECS, &mut cfg.command_timeout_secs);
    if let Some(dir) = lookup(ENV_TEAMS_DIR).filter(|v| !v.trim().is_empty()) {
        cfg.teams_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = lookup(ENV_COUNTER_DIR).filter(|v| !v.trim().is_empty()) {
        cfg.counter_dir = Some(PathBuf::from(dir));
    }
}

fn override_number<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

/// Load config from a TOML file, without environment overrides.
///
/// If the file is missing, returns `DispatchConfig::default()`.
pub fn load_config(path: &Path) -> Result<DispatchConfig> {
    if !path.exists() {
        return Ok(DispatchConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Load the file, apply process environment overrides, then validate.
pub fn load_effective_config(path: &Path) -> Result<DispatchConfig> {
    let mut cfg = load_config(path)?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Defaults with environment overrides, for when the file is unusable.
///
/// Overrides that fail validation are dropped wholesale.
pub fn default_with_env_overrides<F>(lookup: F) -> DispatchConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = DispatchConfig::default();
    apply_env_overrides(&mut cfg, lookup);
    match cfg.validate() {
        Ok(()) => cfg,
        Err(err) => {
            warn!(err = %err, "environment overrides invalid, using defaults");
            DispatchConfig::default()
        }
    }
}
