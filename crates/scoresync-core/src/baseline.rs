use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::models::{EntryKey, GameRecord, Remark};
use crate::state::ScoreStore;

/// What the store holds for the keys a cycle looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    pub records: BTreeMap<EntryKey, GameRecord>,
    pub remarks: Vec<Remark>,
    /// Source keys stored under another rule version, with that version.
    pub foreign: BTreeMap<EntryKey, String>,
}

/// Read-only view of the store for one cycle.
pub struct StoreCollector<'a, S: ScoreStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ScoreStore + ?Sized> StoreCollector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Reads records of `rule_version` and all remarks from `from_key` on.
    /// Each of `source_keys` absent from that set is looked up once more to
    /// tell "never stored" apart from "stored under another rule version".
    pub fn collect<'k>(
        &self,
        rule_version: &str,
        from_key: &EntryKey,
        source_keys: impl IntoIterator<Item = &'k EntryKey>,
    ) -> Result<Baseline> {
        let records = self.store.read_records(rule_version, from_key)?;
        let remarks = self.store.read_remarks(from_key)?;

        let mut foreign = BTreeMap::new();
        for key in source_keys {
            if records.contains_key(key) {
                continue;
            }
            if let Some(existing) = self.store.existing_record(key)?
                && existing.rule_version != rule_version
            {
                debug!(key = %key, rule_version = %existing.rule_version, "stored under another rule version");
                foreign.insert(key.clone(), existing.rule_version);
            }
        }

        Ok(Baseline {
            records,
            remarks,
            foreign,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::RuleConfig;
    use crate::models::ScoreReport;
    use crate::scoring::score_game;
    use crate::state::SqliteScoreStore;

    fn store_game(store: &SqliteScoreStore, ts: &str, rule_version: &str) -> EntryKey {
        let key = EntryKey::parse(ts).expect("key");
        let report = ScoreReport {
            seats: [
                ("A".to_string(), "400".to_string()),
                ("B".to_string(), "300".to_string()),
                ("C".to_string(), "200".to_string()),
                ("D".to_string(), "100".to_string()),
            ],
            comment: None,
        };
        let rules = RuleConfig {
            rule_version: rule_version.to_string(),
            ..RuleConfig::default()
        };
        store
            .upsert_record(&score_game(&key, &report, &rules).expect("score"))
            .expect("upsert");
        key
    }

    #[test]
    fn foreign_versions_are_reported_separately() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteScoreStore::open(temp.path().join("db.sqlite3")).expect("open");
        let own = store_game(&store, "1700000100.0", "v2");
        let other = store_game(&store, "1700000200.0", "v1");
        let unknown = EntryKey::parse("1700000300.0").expect("key");

        let baseline = StoreCollector::new(&store)
            .collect(
                "v2",
                &EntryKey::parse("1700000000.0").expect("key"),
                [&own, &other, &unknown],
            )
            .expect("collect");

        assert!(baseline.records.contains_key(&own));
        assert!(!baseline.records.contains_key(&other));
        assert_eq!(baseline.foreign.get(&other).map(String::as_str), Some("v1"));
        assert!(!baseline.foreign.contains_key(&unknown));
    }
}
