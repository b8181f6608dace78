use serde::{Deserialize, Serialize};

use super::EntryKey;

/// A note attached to a game record through the record's thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Remark {
    pub thread_key: EntryKey,
    pub event_key: EntryKey,
    pub name: String,
    pub note: String,
}

impl Remark {
    #[must_use]
    pub fn to_text(&self) -> String {
        format!("[{} {}]", self.name, self.note)
    }
}
