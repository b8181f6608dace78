use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SyncError};

mod env;
mod rules;
mod search;
mod slack;

pub use rules::RuleConfig;
pub use search::{PolicyConfig, SearchConfig};
pub use slack::SlackConfig;
pub(crate) use slack::normalize_base_url;

const ENV_DB_PATH: &str = "SCORESYNC_DB";
const DEFAULT_DB_FILE: &str = "scoresync.sqlite3";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Runtime settings, built once at startup and handed to each collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub policy: PolicyConfig,
    pub rules: RuleConfig,
    pub slack: SlackConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Reads `path` when given, then applies `SCORESYNC_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(raw)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.search.apply_env();
        self.policy.apply_env();
        self.rules.apply_env();
        self.slack.apply_env();
        if let Some(path) = env::read_non_empty_env(ENV_DB_PATH) {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.keyword.trim().is_empty() {
            return Err(SyncError::Validation("search.keyword must not be empty".to_string()));
        }
        if self.search.remark_keyword.trim().is_empty() {
            return Err(SyncError::Validation(
                "search.remark_keyword must not be empty".to_string(),
            ));
        }
        if self.policy.ok_icon == self.policy.ng_icon {
            return Err(SyncError::Validation(format!(
                "policy.ok_icon and policy.ng_icon must differ (both are {})",
                self.policy.ok_icon
            )));
        }
        if self.rules.rank_point.len() != 4 {
            return Err(SyncError::Validation(format!(
                "rules.rank_point needs 4 entries, got {}",
                self.rules.rank_point.len()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn database_path(&self, root: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(DEFAULT_DB_FILE),
        }
    }
}
