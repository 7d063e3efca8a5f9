//! StateStore — redb-backed persistence for mutable metrics.
//!
//! Every operation is a single redb transaction, so a metric record and its
//! value list are always updated together.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table};
use tracing::debug;

use mocktrics_core::{MetricRecord, ValueSpec};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe metric store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(METRICS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace a metric record. Read-only records are skipped.
    pub fn save(&self, record: &MetricRecord) -> StateResult<()> {
        if record.read_only {
            debug!(name = %record.name, "read-only metric not persisted");
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            put_record(&mut table, record)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(name = %record.name, values = record.values.len(), "metric stored");
        Ok(())
    }

    /// Get a stored metric by name.
    pub fn get(&self, name: &str) -> StateResult<Option<MetricRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(METRICS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: MetricRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Every stored metric, ordered by name.
    pub fn load_all(&self) -> StateResult<Vec<MetricRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(METRICS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: MetricRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a metric by name. Returns true if it existed.
    pub fn delete(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, existed, "metric deleted");
        Ok(existed)
    }

    /// Append a value to a stored metric. A value with the same label set
    /// is replaced in place.
    pub fn save_value(&self, name: &str, value: &ValueSpec) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            let mut record = get_record(&table, name)?
                .ok_or_else(|| StateError::NotFound(format!("metric {name}")))?;
            let wanted = value.label_set();
            match record.values.iter_mut().find(|v| v.label_set() == wanted) {
                Some(existing) => *existing = value.clone(),
                None => record.values.push(value.clone()),
            }
            put_record(&mut table, &record)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, labels = ?value.labels(), "value stored");
        Ok(())
    }

    /// Remove the value whose label set equals `labels`. Returns true if a
    /// value was removed.
    pub fn delete_value(&self, name: &str, labels: &[String]) -> StateResult<bool> {
        let wanted: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!(Table))?;
            let Some(mut record) = get_record(&table, name)? else {
                return Ok(false);
            };
            let before = record.values.len();
            record.values.retain(|v| v.label_set() != wanted);
            removed = record.values.len() != before;
            if removed {
                put_record(&mut table, &record)?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, ?labels, removed, "value deleted");
        Ok(removed)
    }
}

type MetricsTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

fn get_record(table: &MetricsTable<'_>, name: &str) -> StateResult<Option<MetricRecord>> {
    table
        .get(name)
        .map_err(map_err!(Read))?
        .map(|guard| serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize)))
        .transpose()
}

fn put_record(table: &mut MetricsTable<'_>, record: &MetricRecord) -> StateResult<()> {
    let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
    table
        .insert(record.name.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn test_record(name: &str) -> MetricRecord {
        MetricRecord {
            name: name.to_string(),
            documentation: "demo".to_string(),
            unit: "seconds".to_string(),
            labels: labels(&["host", "zone"]),
            read_only: false,
            values: vec![
                ValueSpec::Static {
                    labels: labels(&["a", "eu"]),
                    value: 1.0,
                },
                ValueSpec::Square {
                    labels: labels(&["b", "us"]),
                    period: 60,
                    magnitude: 5.0,
                    offset: 1.0,
                    duty_cycle: 25.0,
                    invert: true,
                },
            ],
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_record("latency");
        store.save(&record).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![record.clone()]);
        assert_eq!(store.get("latency").unwrap(), Some(record));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn read_only_records_are_skipped() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_record("seeded");
        record.read_only = true;
        store.save(&record).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn save_replaces_existing() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_record("latency");
        store.save(&record).unwrap();
        record.values.clear();
        store.save(&record).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].values.is_empty());
    }

    #[test]
    fn load_all_ordered_by_name() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&test_record("zeta")).unwrap();
        store.save(&test_record("alpha")).unwrap();
        let names: Vec<_> = store.load_all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn delete_metric() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&test_record("latency")).unwrap();
        assert!(store.delete("latency").unwrap());
        assert!(!store.delete("latency").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn value_mutations() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&test_record("latency")).unwrap();

        let sine = ValueSpec::Sine {
            labels: labels(&["c", "ap"]),
            period: 120,
            amplitude: 3.0,
            offset: 0.0,
        };
        store.save_value("latency", &sine).unwrap();
        let values = store.get("latency").unwrap().unwrap().values;
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], sine);

        // Label order does not matter for removal.
        assert!(store.delete_value("latency", &labels(&["eu", "a"])).unwrap());
        assert!(!store.delete_value("latency", &labels(&["eu", "a"])).unwrap());
        assert!(!store.delete_value("missing", &labels(&["x", "y"])).unwrap());
        let values = store.get("latency").unwrap().unwrap().values;
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], sine);
    }

    #[test]
    fn save_value_requires_metric() {
        let store = StateStore::open_in_memory().unwrap();
        let value = ValueSpec::Static {
            labels: labels(&["a"]),
            value: 1.0,
        };
        assert!(matches!(
            store.save_value("missing", &value),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mocktrics.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.save(&test_record("latency")).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![test_record("latency")]);
    }
}
