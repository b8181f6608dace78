use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::EntryKey;

mod client;
#[cfg(test)]
pub(crate) mod memory;
mod wire;

pub use client::SlackClient;

/// One message as the log reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub key: EntryKey,
    pub text: String,
    pub sender_id: String,
    pub channel_id: String,
    pub thread_key: Option<EntryKey>,
    pub edited_at: Option<EntryKey>,
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub channel: Option<String>,
    pub after: NaiveDate,
}

impl SearchQuery {
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut query = self.keyword.clone();
        if let Some(channel) = &self.channel {
            query.push_str(&format!(" in:{channel}"));
        }
        query.push_str(&format!(" after:{}", self.after.format("%Y-%m-%d")));
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub entries: Vec<LogEntry>,
    /// Total page count reported for the query.
    pub pages: u32,
}

/// Read and marker-write access to the external message log.
///
/// Reads are idempotent. Marker writes are idempotent too: adding a marker
/// that is present, or removing one that is absent, succeeds.
pub trait MessageLog {
    /// One page (1-based) of entries matching `query`, oldest first.
    fn search_page(&self, query: &SearchQuery, page: u32) -> Result<SearchPage>;

    /// The entry addressed by `key` followed by its replies; the first item is
    /// the entry itself in its current (edited) state.
    fn thread_replies(&self, channel_id: &str, key: &EntryKey) -> Result<Vec<LogEntry>>;

    fn markers(&self, channel_id: &str, key: &EntryKey) -> Result<Vec<String>>;

    fn add_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()>;

    fn remove_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()>;

    /// Id of the channel called `name`, or `None` when the log has no entry
    /// that places it.
    fn resolve_channel(&self, name: &str) -> Result<Option<String>>;
}
