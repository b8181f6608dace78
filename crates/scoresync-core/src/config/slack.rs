use serde::Deserialize;

use super::env::{read_env_u64, read_non_empty_env};

const ENV_SLACK_TOKEN: &str = "SCORESYNC_SLACK_TOKEN";
const ENV_SLACK_BASE_URL: &str = "SCORESYNC_SLACK_BASE_URL";
const ENV_SLACK_TIMEOUT_MS: &str = "SCORESYNC_SLACK_TIMEOUT_MS";

const DEFAULT_BASE_URL: &str = "https://slack.com/api";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// User token; `search.messages` is not available to bot tokens.
    pub token: Option<String>,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SlackConfig {
    pub(super) fn apply_env(&mut self) {
        if let Some(token) = read_non_empty_env(ENV_SLACK_TOKEN) {
            self.token = Some(token);
        }
        if let Some(base_url) = read_non_empty_env(ENV_SLACK_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(timeout_ms) = read_env_u64(ENV_SLACK_TIMEOUT_MS) {
            self.timeout_ms = timeout_ms;
        }
        self.base_url = normalize_base_url(&self.base_url);
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
