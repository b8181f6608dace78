use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::models::RequestLogEntry;

/// Append-only JSONL log of cycle outcomes at `<root>/logs/requests.jsonl`.
#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    pub fn under_root(root: &Path) -> Self {
        Self {
            path: root.join("logs").join("requests.jsonl"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &RequestLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Logging never fails the caller; a write error is only traced.
    fn try_append(&self, entry: &RequestLogEntry) {
        if let Err(err) = self.append(entry) {
            warn!(path = %self.path.display(), error = %err, "request log append failed");
        }
    }

    pub fn log_status(
        &self,
        request_id: String,
        operation: &str,
        status: &str,
        started: Instant,
        run_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.try_append(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: status.to_string(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            recorded_at: Utc::now().to_rfc3339(),
            run_id,
            error_code: None,
            error_message: None,
            details,
        });
    }

    pub fn log_error(
        &self,
        request_id: String,
        operation: &str,
        started: Instant,
        run_id: Option<String>,
        err: &SyncError,
        details: Option<serde_json::Value>,
    ) {
        self.try_append(&RequestLogEntry {
            request_id,
            operation: operation.to_string(),
            status: "error".to_string(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            recorded_at: Utc::now().to_rfc3339(),
            run_id,
            error_code: Some(err.code().to_string()),
            error_message: Some(err.to_string()),
            details,
        });
    }

    /// Parses every readable line, skipping malformed ones.
    pub fn read_entries(&self) -> Result<Vec<RequestLogEntry>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RequestLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(line = line_no + 1, error = %err, "skipping malformed request log line"),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn status_and_error_lines_are_appended() {
        let temp = tempdir().expect("tempdir");
        let log = RequestLog::under_root(temp.path());
        assert!(log.read_entries().expect("empty").is_empty());

        log.log_status(
            "req-1".to_string(),
            "reconcile.run",
            "ok",
            Instant::now(),
            Some("run-1".to_string()),
            Some(serde_json::json!({"missing": 1})),
        );
        log.log_error(
            "req-2".to_string(),
            "reconcile.run",
            Instant::now(),
            None,
            &SyncError::Conflict("busy".to_string()),
            None,
        );
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .expect("open")
            .write_all(b"not json\n")
            .expect("write");

        let entries = log.read_entries().expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].run_id.as_deref(), Some("run-1"));
        assert_eq!(entries[0].details, Some(serde_json::json!({"missing": 1})));
        assert_eq!(entries[1].status, "error");
        assert_eq!(entries[1].error_code.as_deref(), Some("CONFLICT"));
    }
}
