use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileRunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl ReconcileRunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReconcileRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcileRunStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown reconcile run status: {other}")),
        }
    }
}

/// What started a cycle. Both variants run the same cycle; the trigger is only
/// recorded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    Command,
    Reminder,
}

impl Trigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Reminder => "reminder",
        }
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "command" => Ok(Self::Command),
            "reminder" => Ok(Self::Reminder),
            other => Err(format!("unknown trigger: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    Pending,
    Mismatch,
    Missing,
    Deleted,
    RemarkReplaced,
    RemarkDeleted,
    InvalidScore,
    Failed,
    SourceFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub window_start: String,
    pub window_end: String,
    pub mismatch: usize,
    pub missing: usize,
    pub deleted: usize,
    pub remark_replaced: usize,
    pub remark_deleted: usize,
    pub pending: usize,
    pub invalid_score: usize,
    pub failed: usize,
    /// Set when the cycle stopped issuing mutations before the plan was done.
    #[serde(default)]
    pub cancelled: bool,
    pub details: BTreeMap<ReportCategory, Vec<String>>,
}

impl Report {
    pub(crate) fn push_detail(&mut self, category: ReportCategory, line: impl Into<String>) {
        self.details.entry(category).or_default().push(line.into());
    }

    #[must_use]
    pub fn detail(&self, category: ReportCategory) -> &[String] {
        self.details.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Count of store mutations the cycle performed.
    #[must_use]
    pub fn drift_count(&self) -> usize {
        self.mismatch + self.missing + self.deleted + self.remark_replaced + self.remark_deleted
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drift_count() == 0 && self.pending == 0 && self.invalid_score == 0 && self.failed == 0
    }

    /// Human-readable summary in the layout the chat surface posts.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("*[reconcile]* ({} - {})\n", self.window_start, self.window_end);
        if self.pending > 0 {
            out.push_str(&format!("* pending: {}\n", self.pending));
            for line in self.detail(ReportCategory::Pending) {
                out.push_str(&format!("\t\t{line}\n"));
            }
        }
        let sections = [
            ("mismatch", self.mismatch, ReportCategory::Mismatch),
            ("missing", self.missing, ReportCategory::Missing),
            ("deleted", self.deleted, ReportCategory::Deleted),
            ("remark replaced", self.remark_replaced, ReportCategory::RemarkReplaced),
            ("remark deleted", self.remark_deleted, ReportCategory::RemarkDeleted),
        ];
        for (label, count, category) in sections {
            out.push_str(&format!("* {label}: {count}\n"));
            for line in self.detail(category) {
                out.push_str(&format!("\t{line}\n"));
            }
        }
        if self.invalid_score > 0 {
            out.push_str("\n*[raw score total mismatch]*\n");
            for line in self.detail(ReportCategory::InvalidScore) {
                out.push_str(&format!("\t{line}\n"));
            }
        }
        if self.cancelled {
            out.push_str("\n*[cancelled before all changes were applied]*\n");
        }
        let failures = self
            .detail(ReportCategory::Failed)
            .iter()
            .chain(self.detail(ReportCategory::SourceFailure));
        let mut header_written = false;
        for line in failures {
            if !header_written {
                out.push_str("\n*[failures]*\n");
                header_written = true;
            }
            out.push_str(&format!("\t{line}\n"));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRunRecord {
    pub run_id: String,
    pub trigger: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub drift_count: usize,
    pub status: ReconcileRunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rendering_lists_counts_and_failures() {
        let mut report = Report {
            window_start: "2026/10/08".to_string(),
            window_end: "2026/10/15".to_string(),
            missing: 1,
            ..Report::default()
        };
        report.push_detail(ReportCategory::Missing, "2026/10/14 20:00:00 [A 1][B 2][C 3][D 4][]");
        report.push_detail(ReportCategory::Failed, "store write failed");

        let text = report.to_text();
        assert!(text.starts_with("*[reconcile]* (2026/10/08 - 2026/10/15)"));
        assert!(text.contains("* missing: 1\n\t2026/10/14 20:00:00"));
        assert!(text.contains("*[failures]*\n\tstore write failed"));
        assert!(!text.contains("pending"));
    }

    #[test]
    fn details_serialize_with_snake_case_keys() {
        let mut report = Report::default();
        report.push_detail(ReportCategory::RemarkReplaced, "x");
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["details"]["remark_replaced"][0], "x");
    }
}
