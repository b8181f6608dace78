use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{PolicyConfig, SearchConfig};
use crate::error::SyncError;
use crate::extract::ReportParser;
use crate::models::{EntryKey, MarkerState, SourceEntry, SourcePayload};
use crate::slack::{LogEntry, MessageLog, SearchQuery};

/// Half-open time range a cycle looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    #[must_use]
    pub fn lookback(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - chrono::Duration::days(i64::from(days)),
            end: now,
        }
    }

    #[must_use]
    pub fn start_key(&self) -> EntryKey {
        EntryKey::from_datetime(self.start)
    }
}

/// Entries gathered before the message log stopped answering, if it did.
#[derive(Debug, Default)]
pub struct Collected {
    pub entries: Vec<SourceEntry>,
    pub failure: Option<SyncError>,
}

impl Collected {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    #[must_use]
    pub fn earliest_key(&self) -> Option<&EntryKey> {
        self.entries.iter().map(|entry| &entry.key).min()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Scores,
    Remarks,
}

pub struct SourceCollector<'a, L: MessageLog + ?Sized> {
    log: &'a L,
    parser: &'a dyn ReportParser,
    search: &'a SearchConfig,
    policy: &'a PolicyConfig,
}

impl<'a, L: MessageLog + ?Sized> SourceCollector<'a, L> {
    pub fn new(
        log: &'a L,
        parser: &'a dyn ReportParser,
        search: &'a SearchConfig,
        policy: &'a PolicyConfig,
    ) -> Self {
        Self {
            log,
            parser,
            search,
            policy,
        }
    }

    /// Score posts inside `window`, in their current (edited) state.
    pub fn collect(&self, window: &Window) -> Collected {
        self.gather(&self.search.keyword, window, Kind::Scores)
    }

    /// Remark posts inside `window`; each keeps the thread it was posted in.
    pub fn collect_remarks(&self, window: &Window) -> Collected {
        self.gather(&self.search.remark_keyword, window, Kind::Remarks)
    }

    fn gather(&self, keyword: &str, window: &Window, kind: Kind) -> Collected {
        let query = SearchQuery {
            keyword: keyword.to_string(),
            channel: self.search.channel.clone(),
            after: window.start.date_naive(),
        };
        let mut collected = Collected::default();
        let mut seen = BTreeSet::new();
        let mut page = 1;

        loop {
            let result = match self.log.search_page(&query, page) {
                Ok(result) => result,
                Err(err) => {
                    warn!(page, error = %err, "message log search failed; collection incomplete");
                    collected.failure = Some(err);
                    return collected;
                }
            };

            for hit in result.entries {
                if self.policy.is_ignored(&hit.sender_id) {
                    debug!(key = %hit.key, sender = %hit.sender_id, "ignored sender");
                    continue;
                }
                if !seen.insert(hit.key.clone()) {
                    continue;
                }
                match self.resolve(&hit, kind) {
                    Ok(Some(entry)) => collected.entries.push(entry),
                    Ok(None) => debug!(key = %hit.key, "current text no longer extracts"),
                    Err(err) => {
                        warn!(key = %hit.key, error = %err, "thread lookup failed; collection incomplete");
                        collected.failure = Some(err);
                        return collected;
                    }
                }
            }

            if page >= result.pages {
                break;
            }
            page += 1;
        }

        collected.entries.sort_by(|a, b| a.key.cmp(&b.key));
        collected
    }

    fn resolve(&self, hit: &LogEntry, kind: Kind) -> crate::error::Result<Option<SourceEntry>> {
        let channel_id = if hit.channel_id.is_empty() {
            self.search.channel_id.clone().unwrap_or_default()
        } else {
            hit.channel_id.clone()
        };
        let replies = self.log.thread_replies(&channel_id, &hit.key)?;
        let Some(current) = replies.into_iter().next() else {
            return Ok(None);
        };

        let payload = match kind {
            Kind::Scores => match self.parser.extract_score(&current.text) {
                Some(report) => SourcePayload::Score(report),
                None => return Ok(None),
            },
            Kind::Remarks => {
                let notes = self.parser.extract_remarks(&current.text);
                if notes.is_empty() {
                    return Ok(None);
                }
                SourcePayload::Remarks(notes)
            }
        };

        let markers =
            MarkerState::from_icons(&current.markers, &self.policy.ok_icon, &self.policy.ng_icon);
        Ok(Some(SourceEntry {
            key: hit.key.clone(),
            text: current.text,
            sender_id: current.sender_id,
            channel_id,
            thread_key: current.thread_key,
            edited_at: current.edited_at,
            markers,
            payload,
        }))
    }
}
