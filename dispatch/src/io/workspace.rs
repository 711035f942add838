//! Per-invocation handle on a project: paths, effective config and stores.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::core::resolve::RunCandidate;
use crate::core::types::team_name_for_run;
use crate::io::block_counter::BlockCounterStore;
use crate::io::config::{DispatchConfig, default_with_env_overrides, load_effective_config};
use crate::io::lock::LockFile;
use crate::io::paths::ProjectPaths;
use crate::io::state_store::StateStore;
use crate::io::team::{FsTeamRegistry, TeamRegistry};
use crate::state::DispatchState;

#[derive(Debug, Clone)]
pub struct Workspace {
    pub paths: ProjectPaths,
    pub config: DispatchConfig,
    pub store: StateStore,
    pub counters: BlockCounterStore,
}

/// A run read during a scan, with its team liveness.
#[derive(Debug, Clone)]
pub struct ScannedRun {
    pub name: String,
    pub state: DispatchState,
    pub team_alive: bool,
}

impl ScannedRun {
    pub fn candidate(&self) -> RunCandidate<'_> {
        RunCandidate {
            name: &self.name,
            state: &self.state,
            team_alive: self.team_alive,
        }
    }
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: DispatchConfig) -> Self {
        let paths = ProjectPaths::new(root);
        Self {
            store: StateStore::new(paths.clone()),
            counters: BlockCounterStore::new(config.counter_dir()),
            paths,
            config,
        }
    }

    /// Operator commands: a broken config is an error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let config = load_effective_config(&paths.config_path)?;
        Ok(Self::new(paths.root, config))
    }

    /// Hooks: a broken config file degrades to defaults plus environment
    /// overrides.
    pub fn open_or_default(root: impl Into<PathBuf>) -> Self {
        let paths = ProjectPaths::new(root);
        match load_effective_config(&paths.config_path) {
            Ok(config) => Self::new(paths.root, config),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "config unusable, using defaults");
                let config = default_with_env_overrides(|key| std::env::var(key).ok());
                Self::new(paths.root, config)
            }
        }
    }

    pub fn team_registry(&self) -> FsTeamRegistry {
        FsTeamRegistry::new(self.config.teams_dir())
    }

    pub fn lock(&self, run: &str) -> LockFile {
        LockFile::new(self.paths.lock_path(run))
    }

    /// Every readable run in name order, with team liveness.
    pub fn scan(&self, teams: &dyn TeamRegistry) -> Vec<ScannedRun> {
        self.store
            .list_runs()
            .into_iter()
            .map(|(name, state)| {
                let team_alive = teams.is_alive(&team_name_for_run(&name));
                ScannedRun {
                    name,
                    state,
                    team_alive,
                }
            })
            .collect()
    }
}
