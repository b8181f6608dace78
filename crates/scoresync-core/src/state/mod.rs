use std::collections::BTreeMap;
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::models::{EntryKey, GameRecord, PlayerSlot, Remark};

mod migration;
mod runs;

/// Persisted baseline of game records and remarks.
///
/// Every write commits on its own; callers get per-key isolation and nothing
/// spans more than one key.
pub trait ScoreStore {
    /// Records tagged `rule_version` whose key is at or after `from_key`.
    fn read_records(
        &self,
        rule_version: &str,
        from_key: &EntryKey,
    ) -> Result<BTreeMap<EntryKey, GameRecord>>;

    fn upsert_record(&self, record: &GameRecord) -> Result<()>;

    /// Removes the record and every remark in its thread. Returns the event
    /// keys of the removed remarks.
    fn delete_record(&self, key: &EntryKey) -> Result<Vec<EntryKey>>;

    /// Remarks whose parent thread key is at or after `from_key`.
    fn read_remarks(&self, from_key: &EntryKey) -> Result<Vec<Remark>>;

    /// Replaces every remark posted by `event_key` with `remarks`. A remark
    /// whose name is not a player of its parent record is dropped. Returns the
    /// number persisted.
    fn upsert_remark_set(&self, event_key: &EntryKey, remarks: &[Remark]) -> Result<usize>;

    fn delete_remark_set(&self, event_key: &EntryKey) -> Result<usize>;

    /// The record stored under `key`, whatever its rule version.
    fn existing_record(&self, key: &EntryKey) -> Result<Option<GameRecord>>;
}

#[derive(Clone)]
pub struct SqliteScoreStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteScoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteScoreStore").finish_non_exhaustive()
    }
}

const RECORD_COLUMNS: &str = r"
    ts,
    p1_name, p1_str, p1_rpoint, p1_rank, p1_point,
    p2_name, p2_str, p2_rpoint, p2_rank, p2_point,
    p3_name, p3_str, p3_rpoint, p3_rank, p3_point,
    p4_name, p4_str, p4_rpoint, p4_rank, p4_point,
    deposit, rule_version, comment
";

impl SqliteScoreStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::mutex_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::mutex_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    pub fn record_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM result", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

impl ScoreStore for SqliteScoreStore {
    fn read_records(
        &self,
        rule_version: &str,
        from_key: &EntryKey,
    ) -> Result<BTreeMap<EntryKey, GameRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                r"
                SELECT {RECORD_COLUMNS}
                FROM result
                WHERE rule_version = ?1 AND playtime >= ?2
                ORDER BY playtime ASC
                "
            ))?;
            let rows = stmt.query_map(params![rule_version, from_key.seconds()], read_record_row)?;
            let mut out = BTreeMap::new();
            for row in rows {
                let record = into_record(row?)?;
                out.insert(record.key.clone(), record);
            }
            Ok(out)
        })
    }

    fn upsert_record(&self, record: &GameRecord) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                r"
                INSERT INTO result(
                    ts, playtime,
                    p1_name, p1_str, p1_rpoint, p1_rank, p1_point,
                    p2_name, p2_str, p2_rpoint, p2_rank, p2_point,
                    p3_name, p3_str, p3_rpoint, p3_rank, p3_point,
                    p4_name, p4_str, p4_rpoint, p4_rank, p4_point,
                    deposit, rule_version, comment
                )
                VALUES (
                    ?1, ?2,
                    ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16, ?17,
                    ?18, ?19, ?20, ?21, ?22,
                    ?23, ?24, ?25
                )
                ON CONFLICT(ts) DO UPDATE SET
                  playtime=excluded.playtime,
                  p1_name=excluded.p1_name, p1_str=excluded.p1_str, p1_rpoint=excluded.p1_rpoint,
                  p1_rank=excluded.p1_rank, p1_point=excluded.p1_point,
                  p2_name=excluded.p2_name, p2_str=excluded.p2_str, p2_rpoint=excluded.p2_rpoint,
                  p2_rank=excluded.p2_rank, p2_point=excluded.p2_point,
                  p3_name=excluded.p3_name, p3_str=excluded.p3_str, p3_rpoint=excluded.p3_rpoint,
                  p3_rank=excluded.p3_rank, p3_point=excluded.p3_point,
                  p4_name=excluded.p4_name, p4_str=excluded.p4_str, p4_rpoint=excluded.p4_rpoint,
                  p4_rank=excluded.p4_rank, p4_point=excluded.p4_point,
                  deposit=excluded.deposit,
                  rule_version=excluded.rule_version,
                  comment=excluded.comment
                ",
                params_from_iter(record_params(record)),
            )?;
            Ok(())
        })
    }

    fn delete_record(&self, key: &EntryKey) -> Result<Vec<EntryKey>> {
        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                r"
                SELECT DISTINCT event_ts FROM remarks
                WHERE thread_ts = ?1
                ORDER BY event_ts ASC
                ",
            )?;
            let rows = stmt.query_map(params![key.as_str()], |row| row.get::<_, String>(0))?;
            let mut cascaded = Vec::new();
            for row in rows {
                cascaded.push(EntryKey::parse(&row?)?);
            }
            drop(stmt);

            tx.execute("DELETE FROM remarks WHERE thread_ts = ?1", params![key.as_str()])?;
            let removed = tx.execute("DELETE FROM result WHERE ts = ?1", params![key.as_str()])?;
            if removed == 0 {
                debug!(key = %key, "delete_record found no row");
            }
            Ok(cascaded)
        })
    }

    fn read_remarks(&self, from_key: &EntryKey) -> Result<Vec<Remark>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT thread_ts, event_ts, name, matter
                FROM remarks
                WHERE playtime >= ?1
                ORDER BY playtime ASC, event_ts ASC, rowid ASC
                ",
            )?;
            let rows = stmt.query_map(params![from_key.seconds()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (thread_ts, event_ts, name, note) = row?;
                out.push(Remark {
                    thread_key: EntryKey::parse(&thread_ts)?,
                    event_key: EntryKey::parse(&event_ts)?,
                    name,
                    note,
                });
            }
            Ok(out)
        })
    }

    fn upsert_remark_set(&self, event_key: &EntryKey, remarks: &[Remark]) -> Result<usize> {
        if let Some(stray) = remarks.iter().find(|remark| &remark.event_key != event_key) {
            return Err(SyncError::Validation(format!(
                "remark from {} cannot be stored under {event_key}",
                stray.event_key
            )));
        }
        self.with_tx(|tx| {
            tx.execute("DELETE FROM remarks WHERE event_ts = ?1", params![event_key.as_str()])?;
            let mut persisted = 0;
            for remark in remarks {
                let names = tx
                    .query_row(
                        "SELECT p1_name, p2_name, p3_name, p4_name FROM result WHERE ts = ?1",
                        params![remark.thread_key.as_str()],
                        |row| {
                            Ok([
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ])
                        },
                    )
                    .optional()?;
                let valid = names.is_some_and(|names| names.contains(&remark.name));
                if !valid {
                    debug!(
                        event_key = %event_key,
                        name = %remark.name,
                        "remark name is not a player of its thread record"
                    );
                    continue;
                }
                persisted += tx.execute(
                    r"
                    INSERT OR IGNORE INTO remarks(thread_ts, event_ts, playtime, name, matter)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                    params![
                        remark.thread_key.as_str(),
                        event_key.as_str(),
                        remark.thread_key.seconds(),
                        remark.name,
                        remark.note
                    ],
                )?;
            }
            Ok(persisted)
        })
    }

    fn delete_remark_set(&self, event_key: &EntryKey) -> Result<usize> {
        self.with_tx(|tx| {
            let removed =
                tx.execute("DELETE FROM remarks WHERE event_ts = ?1", params![event_key.as_str()])?;
            Ok(removed)
        })
    }

    fn existing_record(&self, key: &EntryKey) -> Result<Option<GameRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM result WHERE ts = ?1"),
                    params![key.as_str()],
                    read_record_row,
                )
                .optional()?;
            row.map(into_record).transpose()
        })
    }
}

type SlotRow = (String, String, i64, i64, f64);

struct RecordRow {
    ts: String,
    slots: [SlotRow; 4],
    deposit: i64,
    rule_version: String,
    comment: Option<String>,
}

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    let slot = |base: usize| -> rusqlite::Result<SlotRow> {
        Ok((
            row.get(base)?,
            row.get(base + 1)?,
            row.get(base + 2)?,
            row.get(base + 3)?,
            row.get(base + 4)?,
        ))
    };
    Ok(RecordRow {
        ts: row.get(0)?,
        slots: [slot(1)?, slot(6)?, slot(11)?, slot(16)?],
        deposit: row.get(21)?,
        rule_version: row.get(22)?,
        comment: row.get(23)?,
    })
}

fn into_record(row: RecordRow) -> Result<GameRecord> {
    let key = EntryKey::parse(&row.ts)?;
    let slots = row.slots.map(|(name, raw, raw_score, rank, point)| PlayerSlot {
        name,
        raw,
        raw_score,
        rank: u8::try_from(rank).unwrap_or(0),
        point,
    });
    Ok(GameRecord {
        key,
        slots,
        comment: row.comment,
        deposit: row.deposit,
        rule_version: row.rule_version,
    })
}

fn record_params(record: &GameRecord) -> Vec<Value> {
    let mut values = vec![
        Value::Text(record.key.as_str().to_string()),
        Value::Real(record.key.seconds()),
    ];
    for slot in &record.slots {
        values.push(Value::Text(slot.name.clone()));
        values.push(Value::Text(slot.raw.clone()));
        values.push(Value::Integer(slot.raw_score));
        values.push(Value::Integer(i64::from(slot.rank)));
        values.push(Value::Real(slot.point));
    }
    values.push(Value::Integer(record.deposit));
    values.push(Value::Text(record.rule_version.clone()));
    values.push(record.comment.clone().map_or(Value::Null, Value::Text));
    values
}

fn usize_to_i64_saturating(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
