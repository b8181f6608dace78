use serde::Deserialize;

use super::env::{parse_bool, read_env_u32, read_env_u64, read_non_empty_env, split_list};

const ENV_CHANNEL: &str = "SCORESYNC_CHANNEL";
const ENV_CHANNEL_ID: &str = "SCORESYNC_CHANNEL_ID";
const ENV_LOOKBACK_DAYS: &str = "SCORESYNC_LOOKBACK_DAYS";
const ENV_SETTLE_SECS: &str = "SCORESYNC_SETTLE_SECS";
const ENV_THREAD_REPORT: &str = "SCORESYNC_THREAD_REPORT";
const ENV_IGNORED_SENDERS: &str = "SCORESYNC_IGNORED_SENDERS";

const DEFAULT_KEYWORD: &str = "終局";
const DEFAULT_REMARK_KEYWORD: &str = "麻雀成績メモ";
const DEFAULT_LOOKBACK_DAYS: u32 = 7;
const DEFAULT_SETTLE_SECS: u64 = 180;
const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub keyword: String,
    pub remark_keyword: String,
    /// Channel name used to scope log searches (`in:<channel>`).
    pub channel: Option<String>,
    /// Channel id used for marker cleanup on keys no longer present in the log.
    pub channel_id: Option<String>,
    pub lookback_days: u32,
    pub settle_secs: u64,
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            remark_keyword: DEFAULT_REMARK_KEYWORD.to_string(),
            channel: None,
            channel_id: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            settle_secs: DEFAULT_SETTLE_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchConfig {
    pub(super) fn apply_env(&mut self) {
        if let Some(channel) = read_non_empty_env(ENV_CHANNEL) {
            self.channel = Some(channel);
        }
        if let Some(channel_id) = read_non_empty_env(ENV_CHANNEL_ID) {
            self.channel_id = Some(channel_id);
        }
        if let Some(days) = read_env_u32(ENV_LOOKBACK_DAYS) {
            self.lookback_days = days;
        }
        if let Some(secs) = read_env_u64(ENV_SETTLE_SECS) {
            self.settle_secs = secs;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Whether score reports posted as thread replies are accepted.
    pub thread_report: bool,
    pub ok_icon: String,
    pub ng_icon: String,
    pub ignored_senders: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            thread_report: true,
            ok_icon: "ok".to_string(),
            ng_icon: "ng".to_string(),
            ignored_senders: Vec::new(),
        }
    }
}

impl PolicyConfig {
    pub(super) fn apply_env(&mut self) {
        if let Some(allowed) = parse_bool(std::env::var(ENV_THREAD_REPORT).ok().as_deref()) {
            self.thread_report = allowed;
        }
        if let Some(raw) = read_non_empty_env(ENV_IGNORED_SENDERS) {
            self.ignored_senders = split_list(&raw);
        }
    }

    #[must_use]
    pub fn is_ignored(&self, sender_id: &str) -> bool {
        self.ignored_senders.iter().any(|ignored| ignored == sender_id)
    }
}
