use chrono::Utc;
use rusqlite::params;

use crate::error::{Result, SyncError};
use crate::models::{ReconcileRunRecord, ReconcileRunStatus, Trigger};

use super::{SqliteScoreStore, usize_to_i64_saturating};

impl SqliteScoreStore {
    pub fn start_reconcile_run(&self, run_id: &str, trigger: Trigger) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT OR REPLACE INTO reconcile_runs(run_id, trigger_kind, started_at, drift_count, status)
                VALUES (?1, ?2, ?3, 0, ?4)
                ",
                params![
                    run_id,
                    trigger.as_str(),
                    Utc::now().to_rfc3339(),
                    ReconcileRunStatus::Running.as_str()
                ],
            )?;
            Ok(())
        })
    }

    pub fn finish_reconcile_run(
        &self,
        run_id: &str,
        drift_count: usize,
        status: ReconcileRunStatus,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                UPDATE reconcile_runs
                SET ended_at = ?2, drift_count = ?3, status = ?4
                WHERE run_id = ?1
                ",
                params![
                    run_id,
                    Utc::now().to_rfc3339(),
                    usize_to_i64_saturating(drift_count),
                    status.as_str()
                ],
            )?;
            Ok(())
        })
    }

    /// Most recent runs first.
    pub fn list_reconcile_runs(&self, limit: usize) -> Result<Vec<ReconcileRunRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT run_id, trigger_kind, started_at, ended_at, drift_count, status
                FROM reconcile_runs
                ORDER BY started_at DESC, rowid DESC
                LIMIT ?1
                ",
            )?;
            let rows = stmt.query_map(params![usize_to_i64_saturating(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (run_id, trigger, started_at, ended_at, drift_count, status) = row?;
                let status = status
                    .trim()
                    .to_ascii_lowercase()
                    .parse::<ReconcileRunStatus>()
                    .map_err(SyncError::Validation)?;
                out.push(ReconcileRunRecord {
                    run_id,
                    trigger,
                    started_at,
                    ended_at,
                    drift_count: usize::try_from(drift_count).unwrap_or(0),
                    status,
                });
            }
            Ok(out)
        })
    }
}
