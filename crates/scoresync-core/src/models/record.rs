use serde::{Deserialize, Serialize};

use super::EntryKey;

pub const SEATS: usize = 4;

/// Four (name, raw score) pairs and an optional comment, exactly as posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub seats: [(String, String); SEATS],
    pub comment: Option<String>,
}

impl ScoreReport {
    #[must_use]
    pub fn names(&self) -> [&str; SEATS] {
        [
            self.seats[0].0.as_str(),
            self.seats[1].0.as_str(),
            self.seats[2].0.as_str(),
            self.seats[3].0.as_str(),
        ]
    }

    #[must_use]
    pub fn has_player(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    /// `[name raw][name raw][name raw][name raw][comment]`
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (name, raw) in &self.seats {
            out.push_str(&format!("[{name} {raw}]"));
        }
        out.push_str(&format!("[{}]", self.comment.as_deref().unwrap_or("")));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub name: String,
    pub raw: String,
    pub raw_score: i64,
    pub rank: u8,
    pub point: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub key: EntryKey,
    pub slots: [PlayerSlot; SEATS],
    pub comment: Option<String>,
    pub deposit: i64,
    pub rule_version: String,
}

impl GameRecord {
    #[must_use]
    pub fn names(&self) -> [&str; SEATS] {
        [
            self.slots[0].name.as_str(),
            self.slots[1].name.as_str(),
            self.slots[2].name.as_str(),
            self.slots[3].name.as_str(),
        ]
    }

    #[must_use]
    pub fn has_player(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    #[must_use]
    pub fn raw_score_sum(&self) -> i64 {
        self.slots
            .iter()
            .fold(0i64, |total, slot| total.saturating_add(slot.raw_score))
    }

    /// Compares everything a reconciliation cares about; key and rule version
    /// are gated separately by the caller.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.slots == other.slots && self.comment == other.comment && self.deposit == other.deposit
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for slot in &self.slots {
            out.push_str(&format!("[{} {}]", slot.name, slot.raw));
        }
        out.push_str(&format!("[{}]", self.comment.as_deref().unwrap_or("")));
        out
    }
}
