use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Message-log entry identifier, a `seconds.micros` epoch timestamp string.
///
/// The string form is kept verbatim because the message log addresses entries
/// by it; ordering and age checks go through the parsed seconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SyncError::InvalidKey("empty key".to_string()));
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(Self(trimmed.to_string())),
            _ => Err(SyncError::InvalidKey(trimmed.to_string())),
        }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}.{:06}",
            at.timestamp(),
            at.timestamp_subsec_micros()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.0.parse::<f64>().unwrap_or(0.0)
    }

    /// Local wall-clock rendering used in report detail lines.
    #[must_use]
    pub fn display_time(&self) -> String {
        let seconds = self.seconds();
        let whole = seconds.trunc() as i64;
        match Local.timestamp_opt(whole, 0).single() {
            Some(at) => at.format("%Y/%m/%d %H:%M:%S").to_string(),
            None => self.0.clone(),
        }
    }
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds()
            .total_cmp(&other.seconds())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryKey {
    type Err = SyncError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

/// Seconds since the epoch for `at`, in the same unit as [`EntryKey::seconds`].
#[must_use]
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
