use rusqlite::Connection;

use crate::error::{Result, SyncError};

use super::SqliteScoreStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS result (
        ts TEXT PRIMARY KEY,
        playtime REAL NOT NULL,
        p1_name TEXT NOT NULL,
        p1_str TEXT NOT NULL,
        p1_rpoint INTEGER NOT NULL,
        p1_rank INTEGER NOT NULL,
        p1_point REAL NOT NULL,
        p2_name TEXT NOT NULL,
        p2_str TEXT NOT NULL,
        p2_rpoint INTEGER NOT NULL,
        p2_rank INTEGER NOT NULL,
        p2_point REAL NOT NULL,
        p3_name TEXT NOT NULL,
        p3_str TEXT NOT NULL,
        p3_rpoint INTEGER NOT NULL,
        p3_rank INTEGER NOT NULL,
        p3_point REAL NOT NULL,
        p4_name TEXT NOT NULL,
        p4_str TEXT NOT NULL,
        p4_rpoint INTEGER NOT NULL,
        p4_rank INTEGER NOT NULL,
        p4_point REAL NOT NULL,
        deposit INTEGER NOT NULL,
        rule_version TEXT NOT NULL,
        comment TEXT
    );

    CREATE TABLE IF NOT EXISTS remarks (
        thread_ts TEXT NOT NULL,
        event_ts TEXT NOT NULL,
        playtime REAL NOT NULL,
        name TEXT NOT NULL,
        matter TEXT NOT NULL,
        UNIQUE(thread_ts, event_ts, name, matter)
    );

    CREATE TABLE IF NOT EXISTS reconcile_runs (
        run_id TEXT PRIMARY KEY,
        trigger_kind TEXT NOT NULL,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        drift_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL
    );
";

const MIGRATION_INDEX_SQL: &str = r"
    CREATE INDEX IF NOT EXISTS idx_result_version_playtime
    ON result(rule_version, playtime);

    CREATE INDEX IF NOT EXISTS idx_remarks_event_ts
    ON remarks(event_ts);

    CREATE INDEX IF NOT EXISTS idx_remarks_thread_ts
    ON remarks(thread_ts);

    CREATE INDEX IF NOT EXISTS idx_reconcile_runs_started_at
    ON reconcile_runs(started_at DESC);
";

impl SqliteScoreStore {
    pub fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
            ensure_required_column(
                conn,
                "result",
                "playtime",
                "unsupported result schema: playtime is missing; rebuild the score database",
            )?;
            ensure_required_column(
                conn,
                "remarks",
                "playtime",
                "unsupported remarks schema: playtime is missing; rebuild the score database",
            )?;
            ensure_required_column(
                conn,
                "reconcile_runs",
                "trigger_kind",
                "unsupported reconcile_runs schema: trigger_kind is missing; rebuild the score database",
            )?;
            conn.execute_batch(MIGRATION_INDEX_SQL)?;
            Ok(())
        })
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(SyncError::Validation(error_message.to_string()))
    }
}
