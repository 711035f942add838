//! Team registry lookups.
//!
//! The registry is owned by the host: `<teams dir>/<team>/config.json` lists
//! live worker processes under `members`. Dispatch only ever reads it.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

/// Read-only view of which teams have live members.
pub trait TeamRegistry {
    /// True iff the team exists and has at least one member.
    fn is_alive(&self, team: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct FsTeamRegistry {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TeamConfig {
    #[serde(default)]
    members: Vec<serde_json::Value>,
}

impl FsTeamRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn config_path(&self, team: &str) -> PathBuf {
        self.dir.join(team).join("config.json")
    }
}

impl TeamRegistry for FsTeamRegistry {
    fn is_alive(&self, team: &str) -> bool {
        let path = self.config_path(team);
        let Ok(contents) = fs::read_to_string(&path) else {
            debug!(team, "no team registry entry");
            return false;
        };
        match serde_json::from_str::<TeamConfig>(&contents) {
            Ok(cfg) => {
                debug!(team, members = cfg.members.len(), "team registry entry");
                !cfg.members.is_empty()
            }
            Err(err) => {
                debug!(team, err = %err, "unreadable team registry entry");
                false
            }
        }
    }
}
