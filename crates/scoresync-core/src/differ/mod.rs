//! Three-way comparison of the message log against the stored baseline.
//!
//! The differ is pure: it reads a snapshot of both sides and returns a [`Plan`].
//! It never touches the store or the log.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::baseline::Baseline;
use crate::config::{PolicyConfig, RuleConfig, SearchConfig};
use crate::models::{EntryKey, GameRecord, MarkerState, Remark, SourceEntry, Verdict};
use crate::scoring::score_game;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// The key is gone from the log, or no longer parses as a score.
    NotInSource,
    /// Score posted as a thread reply while thread reports are disabled.
    ThreadPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    InsertRecord {
        record: GameRecord,
    },
    UpdateRecord {
        before: GameRecord,
        after: GameRecord,
    },
    DeleteRecord {
        key: EntryKey,
        /// Channel for marker cleanup; `None` when it could not be resolved.
        channel: Option<String>,
        /// Markers known from this cycle's source read, if the key was seen.
        markers: Option<MarkerState>,
        reason: DeleteReason,
    },
    SetVerdict {
        key: EntryKey,
        channel: String,
        verdict: Verdict,
        current: MarkerState,
    },
    ReplaceRemarks {
        event_key: EntryKey,
        channel: String,
        remarks: Vec<Remark>,
    },
    DeleteRemarks {
        event_key: EntryKey,
        channel: Option<String>,
    },
}

impl Decision {
    #[must_use]
    pub fn key(&self) -> &EntryKey {
        match self {
            Self::InsertRecord { record } => &record.key,
            Self::UpdateRecord { after, .. } => &after.key,
            Self::DeleteRecord { key, .. } | Self::SetVerdict { key, .. } => key,
            Self::ReplaceRemarks { event_key, .. } | Self::DeleteRemarks { event_key, .. } => {
                event_key
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InsertRecord { .. } => "insert_record",
            Self::UpdateRecord { .. } => "update_record",
            Self::DeleteRecord { .. } => "delete_record",
            Self::SetVerdict { .. } => "set_verdict",
            Self::ReplaceRemarks { .. } => "replace_remarks",
            Self::DeleteRemarks { .. } => "delete_remarks",
        }
    }
}

/// Snapshot of both sides for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct DiffInput<'a> {
    /// Epoch seconds the settle window is measured against.
    pub now: f64,
    pub scores: &'a [SourceEntry],
    pub scores_complete: bool,
    pub remarks: &'a [SourceEntry],
    pub remarks_complete: bool,
    pub baseline: &'a Baseline,
    pub search: &'a SearchConfig,
    /// Channel for marker cleanup on keys no longer in the log.
    pub cleanup_channel: Option<&'a str>,
    pub policy: &'a PolicyConfig,
    pub rules: &'a RuleConfig,
}

/// Decisions in apply order (records, then verdicts, then remarks) plus the
/// observations that do not mutate anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub decisions: Vec<Decision>,
    pub pending: Vec<String>,
    pub invalid_score: Vec<String>,
    pub rejected: Vec<String>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[must_use]
pub fn diff(input: &DiffInput<'_>) -> Plan {
    let mut plan = Plan::default();
    let mut verdicts = Vec::new();
    diff_records(input, &mut plan, &mut verdicts);
    plan.decisions.extend(verdicts);
    diff_remarks(input, &mut plan);
    plan
}

fn is_settling(now: f64, touched: f64, settle_secs: u64) -> bool {
    now - touched < settle_secs as f64
}

fn diff_records(input: &DiffInput<'_>, plan: &mut Plan, verdicts: &mut Vec<Decision>) {
    let settle = input.search.settle_secs;
    let baseline = input.baseline;
    let mut seen = BTreeSet::new();

    for entry in input.scores {
        let Some(report) = entry.score() else {
            continue;
        };
        seen.insert(entry.key.clone());

        if is_settling(input.now, entry.last_touched(), settle) {
            plan.pending
                .push(format!("{} {}", entry.key.display_time(), report.to_text()));
            continue;
        }

        if !input.policy.thread_report && entry.in_thread() {
            if baseline.records.contains_key(&entry.key) {
                plan.decisions.push(Decision::DeleteRecord {
                    key: entry.key.clone(),
                    channel: Some(entry.channel_id.clone()),
                    markers: Some(entry.markers),
                    reason: DeleteReason::ThreadPolicy,
                });
            } else {
                debug!(key = %entry.key, "thread report ignored by policy");
            }
            continue;
        }

        if let Some(version) = baseline.foreign.get(&entry.key) {
            debug!(key = %entry.key, rule_version = %version, "skipping record of another rule version");
            continue;
        }

        let record = match score_game(&entry.key, report, input.rules) {
            Ok(record) => record,
            Err(err) => {
                plan.rejected
                    .push(format!("{} {}: {err}", entry.key.display_time(), report.to_text()));
                continue;
            }
        };

        match baseline.records.get(&entry.key) {
            Some(stored) if stored.same_content(&record) => {}
            Some(stored) => plan.decisions.push(Decision::UpdateRecord {
                before: stored.clone(),
                after: record.clone(),
            }),
            None => plan.decisions.push(Decision::InsertRecord {
                record: record.clone(),
            }),
        }

        let verdict = if record.deposit == 0 {
            Verdict::Ok
        } else {
            plan.invalid_score.push(format!(
                "{} deposit {} {}",
                entry.key.display_time(),
                record.deposit,
                record.to_text()
            ));
            Verdict::Ng
        };
        if !verdict.satisfied_by(entry.markers) {
            verdicts.push(Decision::SetVerdict {
                key: entry.key.clone(),
                channel: entry.channel_id.clone(),
                verdict,
                current: entry.markers,
            });
        }
    }

    for (key, stored) in &baseline.records {
        if seen.contains(key) {
            continue;
        }
        if is_settling(input.now, key.seconds(), settle) {
            plan.pending
                .push(format!("{} {}", key.display_time(), stored.to_text()));
            continue;
        }
        if !input.scores_complete {
            debug!(key = %key, "store-only record kept; source collection incomplete");
            continue;
        }
        plan.decisions.push(Decision::DeleteRecord {
            key: key.clone(),
            channel: input.cleanup_channel.map(str::to_string),
            markers: None,
            reason: DeleteReason::NotInSource,
        });
    }
}

fn diff_remarks(input: &DiffInput<'_>, plan: &mut Plan) {
    let settle = input.search.settle_secs;
    let parents = input
        .scores
        .iter()
        .filter_map(|entry| entry.score().map(|report| (&entry.key, (entry, report))))
        .collect::<BTreeMap<_, _>>();

    // Event keys that must not be touched this cycle on either side.
    let mut frozen = BTreeSet::new();
    let mut source: BTreeMap<EntryKey, (&SourceEntry, Vec<Remark>)> = BTreeMap::new();

    for entry in input.remarks {
        if entry.remark_notes().is_empty() || !entry.in_thread() {
            continue;
        }
        let Some(thread_key) = entry.thread_key.as_ref() else {
            continue;
        };
        let Some((parent, report)) = parents.get(thread_key) else {
            debug!(event_key = %entry.key, thread_key = %thread_key, "remark parent outside window");
            frozen.insert(entry.key.clone());
            continue;
        };
        if is_settling(input.now, entry.last_touched(), settle)
            || is_settling(input.now, parent.last_touched(), settle)
        {
            plan.pending.push(format!(
                "{} remark {}",
                entry.key.display_time(),
                entry.text.trim()
            ));
            frozen.insert(entry.key.clone());
            continue;
        }

        let remarks = entry
            .remark_notes()
            .iter()
            .filter(|note| report.has_player(&note.name))
            .map(|note| Remark {
                thread_key: thread_key.clone(),
                event_key: entry.key.clone(),
                name: note.name.clone(),
                note: note.note.clone(),
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        if remarks.is_empty() {
            continue;
        }
        source.insert(entry.key.clone(), (entry, remarks));
    }

    let mut stored: BTreeMap<EntryKey, Vec<Remark>> = BTreeMap::new();
    for remark in &input.baseline.remarks {
        stored
            .entry(remark.event_key.clone())
            .or_default()
            .push(remark.clone());
    }
    for remarks in stored.values_mut() {
        remarks.sort();
        remarks.dedup();
    }

    for (event_key, (entry, remarks)) in &source {
        if stored.get(event_key) == Some(remarks) {
            continue;
        }
        plan.decisions.push(Decision::ReplaceRemarks {
            event_key: event_key.clone(),
            channel: entry.channel_id.clone(),
            remarks: remarks.clone(),
        });
    }

    for event_key in stored.keys() {
        if source.contains_key(event_key) || frozen.contains(event_key) {
            continue;
        }
        if is_settling(input.now, event_key.seconds(), settle) {
            plan.pending
                .push(format!("{} remark {event_key}", event_key.display_time()));
            continue;
        }
        if !input.remarks_complete {
            debug!(event_key = %event_key, "store-only remarks kept; source collection incomplete");
            continue;
        }
        plan.decisions.push(Decision::DeleteRemarks {
            event_key: event_key.clone(),
            channel: input.cleanup_channel.map(str::to_string),
        });
    }
}
