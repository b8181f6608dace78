mod journal;
mod key;
mod reconcile;
mod record;
mod remark;
mod source;

pub use journal::RequestLogEntry;
pub use key::{EntryKey, epoch_seconds};
pub use reconcile::{
    ReconcileRunRecord, ReconcileRunStatus, Report, ReportCategory, Trigger,
};
pub use record::{GameRecord, PlayerSlot, SEATS, ScoreReport};
pub use remark::Remark;
pub use source::{MarkerState, RemarkNote, SourceEntry, SourcePayload, Verdict};
