use crate::config::DaemonConfig;
use crate::repo::{Repository, SqliteRepository};
use crate::seed::{self, SeedSummary};
use chrono::Local;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub repo: Box<dyn Repository>,
    pub config: DaemonConfig,
}

impl AppState {
    /// Build the daemon state with an empty store, loading the configured seed
    /// file when `seed` is set.
    pub fn open(config: DaemonConfig, seed: bool) -> anyhow::Result<Self> {
        let (repo, _) = build_store(&config, seed)?;
        Ok(Self {
            repo: Box::new(repo),
            config,
        })
    }

    /// Start over with a fresh store. The current store is only replaced once
    /// the new one is fully built, so a failed seed leaves it untouched.
    pub fn reset(&mut self, seed: bool) -> anyhow::Result<Option<SeedSummary>> {
        let (repo, summary) = build_store(&self.config, seed)?;
        self.repo = Box::new(repo);
        info!(seed, "session reset");
        Ok(summary)
    }
}

fn build_store(
    config: &DaemonConfig,
    seed: bool,
) -> anyhow::Result<(SqliteRepository, Option<SeedSummary>)> {
    let repo = SqliteRepository::open_in_memory(config.store.clone())?;
    let summary = match (&config.seed_path, seed) {
        (Some(path), true) => {
            let data = seed::read_seed(path)?;
            Some(seed::apply_seed(&repo, data, Local::now().date_naive())?)
        }
        _ => None,
    };
    Ok((repo, summary))
}
