use serde::{Deserialize, Serialize};

use super::{EntryKey, ScoreReport};

/// Which of the two status markers are currently present on an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerState {
    pub ok: bool,
    pub ng: bool,
}

impl MarkerState {
    #[must_use]
    pub fn from_icons<S: AsRef<str>>(icons: &[S], ok_icon: &str, ng_icon: &str) -> Self {
        Self {
            ok: icons.iter().any(|icon| icon.as_ref() == ok_icon),
            ng: icons.iter().any(|icon| icon.as_ref() == ng_icon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    Ng,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Ng => "ng",
        }
    }

    #[must_use]
    pub const fn satisfied_by(self, markers: MarkerState) -> bool {
        match self {
            Self::Ok => markers.ok && !markers.ng,
            Self::Ng => markers.ng && !markers.ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemarkNote {
    pub name: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcePayload {
    Score(ScoreReport),
    Remarks(Vec<RemarkNote>),
}

/// One message-log entry as observed during a single cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub key: EntryKey,
    pub text: String,
    pub sender_id: String,
    pub channel_id: String,
    pub thread_key: Option<EntryKey>,
    pub edited_at: Option<EntryKey>,
    pub markers: MarkerState,
    pub payload: SourcePayload,
}

impl SourceEntry {
    /// Replies carry a thread key different from their own key; thread parents
    /// either carry none or their own.
    #[must_use]
    pub fn in_thread(&self) -> bool {
        self.thread_key
            .as_ref()
            .is_some_and(|thread| thread != &self.key)
    }

    /// Timestamp the settle window is measured from.
    #[must_use]
    pub fn last_touched(&self) -> f64 {
        match &self.edited_at {
            Some(edited) => edited.seconds().max(self.key.seconds()),
            None => self.key.seconds(),
        }
    }

    #[must_use]
    pub fn score(&self) -> Option<&ScoreReport> {
        match &self.payload {
            SourcePayload::Score(report) => Some(report),
            SourcePayload::Remarks(_) => None,
        }
    }

    #[must_use]
    pub fn remark_notes(&self) -> &[RemarkNote] {
        match &self.payload {
            SourcePayload::Remarks(notes) => notes,
            SourcePayload::Score(_) => &[],
        }
    }
}
