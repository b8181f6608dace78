use tempfile::tempdir;

use crate::config::RuleConfig;
use crate::models::{ReconcileRunStatus, ScoreReport, Trigger};
use crate::scoring::score_game;

use super::*;

fn key(raw: &str) -> EntryKey {
    EntryKey::parse(raw).expect("key")
}

fn record(ts: &str, scores: [i64; 4], rule_version: &str) -> GameRecord {
    let names = ["A", "B", "C", "D"];
    let report = ScoreReport {
        seats: std::array::from_fn(|seat| (names[seat].to_string(), scores[seat].to_string())),
        comment: None,
    };
    let rules = RuleConfig {
        rule_version: rule_version.to_string(),
        ..RuleConfig::default()
    };
    score_game(&key(ts), &report, &rules).expect("score")
}

fn remark(thread: &str, event: &str, name: &str, note: &str) -> Remark {
    Remark {
        thread_key: key(thread),
        event_key: key(event),
        name: name.to_string(),
        note: note.to_string(),
    }
}

fn open_store() -> (tempfile::TempDir, SqliteScoreStore) {
    let temp = tempdir().expect("tempdir");
    let store = SqliteScoreStore::open(temp.path().join("scores.sqlite3")).expect("open failed");
    (temp, store)
}

#[test]
fn upsert_then_read_returns_the_same_record() {
    let (_temp, store) = open_store();
    let game = record("1700000100.000100", [400, 300, 200, 100], "v1");
    store.upsert_record(&game).expect("upsert");

    let records = store.read_records("v1", &key("0")).expect("read");
    assert_eq!(records.len(), 1);
    assert_eq!(records.get(&game.key), Some(&game));
    assert_eq!(store.record_count().expect("count"), 1);
}

#[test]
fn upsert_overwrites_existing_key() {
    let (_temp, store) = open_store();
    store
        .upsert_record(&record("1700000100.0", [400, 300, 200, 100], "v1"))
        .expect("insert");
    let updated = record("1700000100.0", [250, 250, 250, 250], "v1");
    store.upsert_record(&updated).expect("update");

    let stored = store
        .existing_record(&updated.key)
        .expect("existing")
        .expect("record present");
    assert_eq!(stored, updated);
    assert_eq!(store.record_count().expect("count"), 1);
}

#[test]
fn read_records_filters_by_rule_version_and_start_key() {
    let (_temp, store) = open_store();
    store
        .upsert_record(&record("1700000100.0", [400, 300, 200, 100], "v1"))
        .expect("upsert");
    store
        .upsert_record(&record("1700000200.0", [400, 300, 200, 100], "v1"))
        .expect("upsert");
    store
        .upsert_record(&record("1700000300.0", [400, 300, 200, 100], "v2"))
        .expect("upsert");

    let records = store.read_records("v1", &key("1700000150.0")).expect("read");
    let keys = records.keys().map(EntryKey::as_str).collect::<Vec<_>>();
    assert_eq!(keys, vec!["1700000200.0"]);

    let foreign = store
        .existing_record(&key("1700000300.0"))
        .expect("existing")
        .expect("present");
    assert_eq!(foreign.rule_version, "v2");
}

#[test]
fn delete_record_cascades_to_thread_remarks() {
    let (_temp, store) = open_store();
    let game = record("1700000100.0", [400, 300, 200, 100], "v1");
    store.upsert_record(&game).expect("upsert");
    store
        .upsert_remark_set(
            &key("1700000110.0"),
            &[remark("1700000100.0", "1700000110.0", "A", "役満")],
        )
        .expect("remarks");
    store
        .upsert_remark_set(
            &key("1700000120.0"),
            &[remark("1700000100.0", "1700000120.0", "B", "焼き鳥")],
        )
        .expect("remarks");

    let cascaded = store.delete_record(&game.key).expect("delete");
    let cascaded = cascaded.iter().map(EntryKey::as_str).collect::<Vec<_>>();
    assert_eq!(cascaded, vec!["1700000110.0", "1700000120.0"]);
    assert!(store.existing_record(&game.key).expect("existing").is_none());
    assert!(store.read_remarks(&key("0")).expect("remarks").is_empty());
}

#[test]
fn delete_record_on_missing_key_is_a_noop() {
    let (_temp, store) = open_store();
    let cascaded = store.delete_record(&key("1700000100.0")).expect("delete");
    assert!(cascaded.is_empty());
}

#[test]
fn remark_set_replaces_wholesale_and_drops_unknown_names() {
    let (_temp, store) = open_store();
    store
        .upsert_record(&record("1700000100.0", [400, 300, 200, 100], "v1"))
        .expect("upsert");
    let event = key("1700000110.0");

    let persisted = store
        .upsert_remark_set(
            &event,
            &[
                remark("1700000100.0", "1700000110.0", "A", "役満"),
                remark("1700000100.0", "1700000110.0", "Z", "not a player"),
                remark("1700000100.0", "1700000110.0", "A", "役満"),
            ],
        )
        .expect("remarks");
    assert_eq!(persisted, 1);

    let persisted = store
        .upsert_remark_set(&event, &[remark("1700000100.0", "1700000110.0", "C", "一発")])
        .expect("replace");
    assert_eq!(persisted, 1);

    let remarks = store.read_remarks(&key("0")).expect("read");
    assert_eq!(remarks, vec![remark("1700000100.0", "1700000110.0", "C", "一発")]);

    assert_eq!(store.delete_remark_set(&event).expect("delete"), 1);
    assert!(store.read_remarks(&key("0")).expect("read").is_empty());
}

#[test]
fn remark_without_parent_record_is_not_persisted() {
    let (_temp, store) = open_store();
    let persisted = store
        .upsert_remark_set(
            &key("1700000110.0"),
            &[remark("1700000100.0", "1700000110.0", "A", "役満")],
        )
        .expect("remarks");
    assert_eq!(persisted, 0);
}

#[test]
fn remark_set_rejects_foreign_event_keys() {
    let (_temp, store) = open_store();
    let err = store
        .upsert_remark_set(
            &key("1700000110.0"),
            &[remark("1700000100.0", "1700000999.0", "A", "役満")],
        )
        .expect_err("must fail");
    assert_eq!(err.code(), "VALIDATION_FAILED");
}

#[test]
fn reconcile_run_lifecycle_is_listed_newest_first() {
    let (_temp, store) = open_store();
    store
        .start_reconcile_run("run-1", Trigger::Command)
        .expect("start");
    store
        .finish_reconcile_run("run-1", 3, ReconcileRunStatus::Success)
        .expect("finish");
    store
        .start_reconcile_run("run-2", Trigger::Reminder)
        .expect("start");

    let runs = store.list_reconcile_runs(10).expect("list");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, "run-2");
    assert_eq!(runs[0].status, ReconcileRunStatus::Running);
    assert_eq!(runs[0].trigger, "reminder");
    assert!(runs[0].ended_at.is_none());
    assert_eq!(runs[1].drift_count, 3);
    assert_eq!(runs[1].status, ReconcileRunStatus::Success);

    assert_eq!(store.list_reconcile_runs(1).expect("list").len(), 1);
}

#[test]
fn open_rejects_result_schema_without_playtime() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("legacy.sqlite3");
    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.execute_batch(
            r"
            CREATE TABLE result (
                ts TEXT PRIMARY KEY,
                p1_name TEXT NOT NULL
            );
            ",
        )
        .expect("legacy schema");
    }

    let err = SqliteScoreStore::open(&db_path).expect_err("must reject");
    assert_eq!(err.code(), "VALIDATION_FAILED");
    assert!(err.to_string().contains("playtime"));
}

#[cfg(unix)]
#[test]
fn open_hardens_score_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("scores.sqlite3");
    let _store = SqliteScoreStore::open(&db_path).expect("open failed");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
