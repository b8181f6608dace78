use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::baseline::StoreCollector;
use crate::config::AppConfig;
use crate::differ::{Decision, DiffInput, diff};
use crate::error::{Result, SyncError};
use crate::extract::KeywordParser;
use crate::models::{
    EntryKey, GameRecord, ReconcileRunStatus, Report, ReportCategory, SourceEntry, Trigger,
    epoch_seconds,
};
use crate::mutator::{Mutator, Outcome};
use crate::request_log::RequestLog;
use crate::slack::MessageLog;
use crate::source::{SourceCollector, Window};
use crate::state::SqliteScoreStore;

const OPERATION: &str = "reconcile.run";

/// Stops a cycle from issuing further mutations. Stays set until `reset`.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Releases the single-flight flag when a cycle ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives reconciliation cycles between a message log and the score store.
pub struct Reconciler<L: MessageLog> {
    config: AppConfig,
    log: L,
    store: SqliteScoreStore,
    parser: KeywordParser,
    request_log: RequestLog,
    running: AtomicBool,
    cancel: CancelHandle,
    /// Channel id looked up from `search.channel`, kept for the process lifetime.
    resolved_channel: OnceLock<String>,
}

impl<L: MessageLog> std::fmt::Debug for Reconciler<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("request_log", &self.request_log)
            .finish_non_exhaustive()
    }
}

impl<L: MessageLog> Reconciler<L> {
    pub fn new(config: AppConfig, log: L, store: SqliteScoreStore, root: &Path) -> Self {
        let parser = KeywordParser::new(&config.search.keyword, &config.search.remark_keyword);
        Self {
            config,
            log,
            store,
            parser,
            request_log: RequestLog::under_root(root),
            running: AtomicBool::new(false),
            cancel: CancelHandle::default(),
            resolved_channel: OnceLock::new(),
        }
    }

    /// Opens the configured database under `root` and builds a reconciler on it.
    pub fn open(config: AppConfig, log: L, root: &Path) -> Result<Self> {
        let store = SqliteScoreStore::open(config.database_path(root))?;
        Ok(Self::new(config, log, store, root))
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn log(&self) -> &L {
        &self.log
    }

    #[must_use]
    pub fn store(&self) -> &SqliteScoreStore {
        &self.store
    }

    #[must_use]
    pub fn request_log(&self) -> &RequestLog {
        &self.request_log
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn run(&self, trigger: Trigger) -> Result<Report> {
        self.run_at(Utc::now(), trigger)
    }

    /// Runs one cycle as if it started at `now`.
    pub fn run_at(&self, now: DateTime<Utc>, trigger: Trigger) -> Result<Report> {
        let _guard = self.begin()?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        self.store.start_reconcile_run(&run_id, trigger)?;
        info!(run_id = %run_id, trigger = trigger.as_str(), "reconcile cycle started");

        let result = self.cycle(now, &run_id);

        match &result {
            Ok(report) => {
                let status = if report.failed > 0
                    || report.cancelled
                    || !report.detail(ReportCategory::SourceFailure).is_empty()
                {
                    ReconcileRunStatus::Partial
                } else {
                    ReconcileRunStatus::Success
                };
                self.store
                    .finish_reconcile_run(&run_id, report.drift_count(), status)?;
                info!(
                    run_id = %run_id,
                    status = status.as_str(),
                    drift = report.drift_count(),
                    pending = report.pending,
                    invalid_score = report.invalid_score,
                    failed = report.failed,
                    "reconcile cycle finished"
                );
                self.request_log.log_status(
                    request_id,
                    OPERATION,
                    status.as_str(),
                    started,
                    Some(run_id),
                    Some(serde_json::json!({
                        "trigger": trigger.as_str(),
                        "mismatch": report.mismatch,
                        "missing": report.missing,
                        "deleted": report.deleted,
                        "remark_replaced": report.remark_replaced,
                        "remark_deleted": report.remark_deleted,
                        "pending": report.pending,
                        "invalid_score": report.invalid_score,
                        "failed": report.failed,
                        "cancelled": report.cancelled,
                    })),
                );
            }
            Err(err) => {
                if let Err(finish_err) =
                    self.store
                        .finish_reconcile_run(&run_id, 0, ReconcileRunStatus::Failed)
                {
                    warn!(run_id = %run_id, error = %finish_err, "failed to mark reconcile run failed");
                }
                warn!(run_id = %run_id, error = %err, "reconcile cycle failed");
                self.request_log.log_error(
                    request_id,
                    OPERATION,
                    started,
                    Some(run_id),
                    err,
                    Some(serde_json::json!({ "trigger": trigger.as_str() })),
                );
            }
        }
        result
    }

    fn begin(&self) -> Result<RunGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Conflict(
                "a reconcile cycle is already running".to_string(),
            ));
        }
        Ok(RunGuard(&self.running))
    }

    fn cycle(&self, now: DateTime<Utc>, run_id: &str) -> Result<Report> {
        let search = &self.config.search;
        let policy = &self.config.policy;
        let rules = &self.config.rules;
        let window = Window::lookback(now, search.lookback_days);
        let mut report = Report {
            run_id: run_id.to_string(),
            window_start: format_time(window.start),
            window_end: format_time(window.end),
            ..Report::default()
        };

        let collector = SourceCollector::new(&self.log, &self.parser, search, policy);
        let scores = collector.collect(&window);
        let remarks = collector.collect_remarks(&window);
        if let Some(err) = &scores.failure {
            report.push_detail(ReportCategory::SourceFailure, format!("score search: {err}"));
        }
        if let Some(err) = &remarks.failure {
            report.push_detail(ReportCategory::SourceFailure, format!("remark search: {err}"));
        }
        debug!(
            scores = scores.entries.len(),
            remarks = remarks.entries.len(),
            "source collected"
        );

        let from_key = scores
            .earliest_key()
            .cloned()
            .unwrap_or_else(|| window.start_key());
        let baseline = StoreCollector::new(&self.store).collect(
            &rules.rule_version,
            &from_key,
            scores.entries.iter().map(|entry| &entry.key),
        )?;
        debug!(
            records = baseline.records.len(),
            remarks = baseline.remarks.len(),
            from_key = %from_key,
            "baseline collected"
        );

        let cleanup_channel = self.cleanup_channel(&scores.entries, &remarks.entries);
        let plan = diff(&DiffInput {
            now: epoch_seconds(now),
            scores: &scores.entries,
            scores_complete: scores.is_complete(),
            remarks: &remarks.entries,
            remarks_complete: remarks.is_complete(),
            baseline: &baseline,
            search,
            cleanup_channel: cleanup_channel.as_deref(),
            policy,
            rules,
        });

        report.pending = plan.pending.len();
        for line in &plan.pending {
            report.push_detail(ReportCategory::Pending, line.clone());
        }
        report.invalid_score = plan.invalid_score.len();
        for line in &plan.invalid_score {
            report.push_detail(ReportCategory::InvalidScore, line.clone());
        }
        report.failed += plan.rejected.len();
        for line in &plan.rejected {
            report.push_detail(ReportCategory::Failed, line.clone());
        }

        let mutator = Mutator::new(&self.log, &self.store, policy);
        let mut cascaded = BTreeSet::new();
        for (idx, decision) in plan.decisions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    remaining = plan.decisions.len() - idx,
                    "cycle cancelled; remaining decisions not applied"
                );
                report.cancelled = true;
                break;
            }
            if let Decision::DeleteRemarks { event_key, .. } = decision
                && cascaded.contains(event_key)
            {
                debug!(event_key = %event_key, "remarks already removed with their record");
                continue;
            }
            match mutator.apply(decision) {
                Ok(outcome) => tally(&mut report, decision, outcome, &baseline.records, &mut cascaded),
                Err(err) => {
                    warn!(
                        key = %decision.key(),
                        decision = decision.kind(),
                        error = %err,
                        "decision failed"
                    );
                    report.failed += 1;
                    report.push_detail(
                        ReportCategory::Failed,
                        format!("{} {}: [{}] {err}", decision.kind(), decision.key(), err.code()),
                    );
                }
            }
        }

        Ok(report)
    }

    /// Channel used to clear markers on keys that are no longer in the log:
    /// the configured id, then `search.channel` looked up by name, then the
    /// one channel every collected entry came from.
    fn cleanup_channel(&self, scores: &[SourceEntry], remarks: &[SourceEntry]) -> Option<String> {
        let search = &self.config.search;
        if let Some(channel_id) = &search.channel_id {
            return Some(channel_id.clone());
        }
        if let Some(channel_id) = self.resolved_channel.get() {
            return Some(channel_id.clone());
        }
        if let Some(name) = search.channel.as_deref() {
            match self.log.resolve_channel(name) {
                Ok(Some(channel_id)) => {
                    info!(channel = name, channel_id = %channel_id, "channel resolved");
                    return Some(self.resolved_channel.get_or_init(|| channel_id).clone());
                }
                Ok(None) => warn!(channel = name, "channel name did not resolve"),
                Err(err) => warn!(channel = name, error = %err, "channel lookup failed"),
            }
        }
        let mut observed = scores
            .iter()
            .chain(remarks)
            .map(|entry| entry.channel_id.as_str())
            .filter(|channel_id| !channel_id.is_empty())
            .collect::<BTreeSet<_>>();
        if observed.len() == 1 {
            observed.pop_first().map(str::to_string)
        } else {
            debug!(channels = observed.len(), "no single channel observed for marker cleanup");
            None
        }
    }
}

fn tally(
    report: &mut Report,
    decision: &Decision,
    outcome: Outcome,
    stored: &BTreeMap<EntryKey, GameRecord>,
    cascaded: &mut BTreeSet<EntryKey>,
) {
    match (decision, outcome) {
        (Decision::InsertRecord { record }, _) => {
            report.missing += 1;
            report.push_detail(
                ReportCategory::Missing,
                format!("{} {}", record.key.display_time(), record.to_text()),
            );
        }
        (Decision::UpdateRecord { before, after }, _) => {
            report.mismatch += 1;
            report.push_detail(
                ReportCategory::Mismatch,
                format!(
                    "{} {} -> {}",
                    after.key.display_time(),
                    before.to_text(),
                    after.to_text()
                ),
            );
        }
        (Decision::DeleteRecord { key, .. }, Outcome::Deleted { cascaded: events }) => {
            report.deleted += 1;
            let text = stored.get(key).map(GameRecord::to_text).unwrap_or_default();
            report.push_detail(
                ReportCategory::Deleted,
                format!("{} {text}", key.display_time()).trim_end().to_string(),
            );
            cascaded.extend(events);
        }
        (Decision::ReplaceRemarks { event_key, remarks, .. }, _) => {
            report.remark_replaced += 1;
            let text = remarks.iter().map(|remark| remark.to_text()).collect::<String>();
            report.push_detail(
                ReportCategory::RemarkReplaced,
                format!("{} {text}", event_key.display_time()),
            );
        }
        (Decision::DeleteRemarks { event_key, .. }, _) => {
            report.remark_deleted += 1;
            report.push_detail(
                ReportCategory::RemarkDeleted,
                format!("{} {event_key}", event_key.display_time()),
            );
        }
        _ => {}
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y/%m/%d %H:%M").to_string()
}
