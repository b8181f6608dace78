use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::models::EntryKey;

use super::LogEntry;

/// Web API errors that mean a marker is already in the wanted state.
const IDEMPOTENT_MARKER_ERRORS: [&str; 2] = ["already_reacted", "no_reaction"];

/// Fields shared by every Web API response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    pub(super) fn check(&self, method: &str) -> Result<()> {
        if self.ok {
            return Ok(());
        }
        Err(SyncError::MessageLog(format!(
            "{method} failed: {}",
            self.error.as_deref().unwrap_or("unknown_error")
        )))
    }

    /// Like [`Envelope::check`], but adding a present marker or removing an
    /// absent one counts as success.
    pub(super) fn check_marker_write(&self, method: &str) -> Result<()> {
        if !self.ok
            && self
                .error
                .as_deref()
                .is_some_and(|error| IDEMPOTENT_MARKER_ERRORS.contains(&error))
        {
            return Ok(());
        }
        self.check(method)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub messages: Option<SearchMessages>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchMessages {
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Paging {
    #[serde(default)]
    pub pages: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchMatch {
    pub ts: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChannelRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RepliesResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReactionsGetResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Message {
    pub ts: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub edited: Option<Edited>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Edited {
    pub ts: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Reaction {
    pub name: String,
}

impl SearchResponse {
    /// Id of the channel called `name` among the matches, if any match sits in it.
    pub(super) fn channel_named(self, name: &str) -> Result<Option<String>> {
        self.envelope.check("search.messages")?;
        let wanted = name.trim_start_matches('#');
        Ok(self
            .messages
            .into_iter()
            .flat_map(|messages| messages.matches)
            .filter_map(|matched| matched.channel)
            .find(|channel| !channel.id.is_empty() && channel.name.as_deref() == Some(wanted))
            .map(|channel| channel.id))
    }
}

impl SearchMatch {
    pub(super) fn into_entry(self) -> Result<LogEntry> {
        Ok(LogEntry {
            key: EntryKey::parse(&self.ts)?,
            text: self.text,
            sender_id: self.user.unwrap_or_default(),
            channel_id: self.channel.map(|channel| channel.id).unwrap_or_default(),
            thread_key: None,
            edited_at: None,
            markers: Vec::new(),
        })
    }
}

impl Message {
    pub(super) fn into_entry(self, channel_id: &str) -> Result<LogEntry> {
        Ok(LogEntry {
            key: EntryKey::parse(&self.ts)?,
            text: self.text,
            sender_id: self.user.unwrap_or_default(),
            channel_id: channel_id.to_string(),
            thread_key: self.thread_ts.as_deref().map(EntryKey::parse).transpose()?,
            edited_at: self
                .edited
                .map(|edited| EntryKey::parse(&edited.ts))
                .transpose()?,
            markers: self.reactions.into_iter().map(|reaction| reaction.name).collect(),
        })
    }
}
