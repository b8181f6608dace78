use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::differ::Decision;
use crate::error::{Result, SyncError};
use crate::models::{EntryKey, MarkerState, Verdict};
use crate::slack::MessageLog;
use crate::state::ScoreStore;

/// What a successfully applied decision changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
    Deleted { cascaded: Vec<EntryKey> },
    Marked,
    RemarksReplaced { persisted: usize },
    RemarksDeleted { removed: usize },
}

/// Applies one decision at a time: store write first, then marker writes.
pub struct Mutator<'a, L: MessageLog + ?Sized, S: ScoreStore + ?Sized> {
    log: &'a L,
    store: &'a S,
    policy: &'a PolicyConfig,
}

impl<'a, L: MessageLog + ?Sized, S: ScoreStore + ?Sized> Mutator<'a, L, S> {
    pub fn new(log: &'a L, store: &'a S, policy: &'a PolicyConfig) -> Self {
        Self { log, store, policy }
    }

    pub fn apply(&self, decision: &Decision) -> Result<Outcome> {
        match decision {
            Decision::InsertRecord { record } => {
                self.store.upsert_record(record)?;
                info!(key = %record.key, "record inserted");
                Ok(Outcome::Inserted)
            }
            Decision::UpdateRecord { after, .. } => {
                self.store.upsert_record(after)?;
                info!(key = %after.key, "record updated");
                Ok(Outcome::Updated)
            }
            Decision::DeleteRecord {
                key,
                channel,
                markers,
                reason,
            } => {
                let cascaded = self.store.delete_record(key)?;
                info!(key = %key, ?reason, cascaded = cascaded.len(), "record deleted");
                let channel = cleanup_channel(channel.as_deref(), key)?;
                self.clear_markers(channel, key, *markers)?;
                for event_key in &cascaded {
                    self.clear_markers(channel, event_key, None)?;
                }
                Ok(Outcome::Deleted { cascaded })
            }
            Decision::SetVerdict {
                key,
                channel,
                verdict,
                current,
            } => {
                self.set_verdict(channel, key, *verdict, *current)?;
                Ok(Outcome::Marked)
            }
            Decision::ReplaceRemarks {
                event_key,
                channel,
                remarks,
            } => {
                let persisted = self.store.upsert_remark_set(event_key, remarks)?;
                info!(event_key = %event_key, persisted, "remarks replaced");
                if persisted > 0 {
                    self.log.add_marker(channel, &self.policy.ok_icon, event_key)?;
                }
                Ok(Outcome::RemarksReplaced { persisted })
            }
            Decision::DeleteRemarks { event_key, channel } => {
                let removed = self.store.delete_remark_set(event_key)?;
                info!(event_key = %event_key, removed, "remarks deleted");
                let channel = cleanup_channel(channel.as_deref(), event_key)?;
                self.log
                    .remove_marker(channel, &self.policy.ok_icon, event_key)?;
                Ok(Outcome::RemarksDeleted { removed })
            }
        }
    }

    fn set_verdict(
        &self,
        channel: &str,
        key: &EntryKey,
        verdict: Verdict,
        current: MarkerState,
    ) -> Result<()> {
        let (wanted, unwanted, has_wanted, has_unwanted) = match verdict {
            Verdict::Ok => (&self.policy.ok_icon, &self.policy.ng_icon, current.ok, current.ng),
            Verdict::Ng => (&self.policy.ng_icon, &self.policy.ok_icon, current.ng, current.ok),
        };
        if has_unwanted {
            self.log.remove_marker(channel, unwanted, key)?;
        }
        if !has_wanted {
            self.log.add_marker(channel, wanted, key)?;
        }
        debug!(key = %key, verdict = verdict.as_str(), "verdict marker set");
        Ok(())
    }

    /// Removes whichever of the two markers are present. Unknown state is
    /// read from the log first.
    fn clear_markers(&self, channel: &str, key: &EntryKey, known: Option<MarkerState>) -> Result<()> {
        let markers = match known {
            Some(markers) => markers,
            None => MarkerState::from_icons(
                &self.log.markers(channel, key)?,
                &self.policy.ok_icon,
                &self.policy.ng_icon,
            ),
        };
        if markers.ok {
            self.log.remove_marker(channel, &self.policy.ok_icon, key)?;
        }
        if markers.ng {
            self.log.remove_marker(channel, &self.policy.ng_icon, key)?;
        }
        Ok(())
    }
}

/// The store write has already happened when this fails, so the markers on
/// `key` are the only thing left undone.
fn cleanup_channel<'c>(channel: Option<&'c str>, key: &EntryKey) -> Result<&'c str> {
    channel.ok_or_else(|| {
        warn!(key = %key, "no channel resolved; markers left in place");
        SyncError::NotFound(format!(
            "channel for marker cleanup on {key} (set search.channel or search.channel_id)"
        ))
    })
}
