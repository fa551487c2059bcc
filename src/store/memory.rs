//! In-memory record store and history archive with optional file persistence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::store::{
    ConfigRecordStore, HistoryArchive, HistorySnapshot, StoreError, StoreResult, StoredRecord,
};

/// On-disk image of the whole store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreImage {
    records: Vec<StoredRecord>,
    history: Vec<HistorySnapshot>,
}

/// A thread-safe store backing both [`ConfigRecordStore`] and [`HistoryArchive`].
///
/// Cloning is cheap and shares state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, StoredRecord>>,
    history: Arc<DashMap<String, Vec<HistorySnapshot>>>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            history: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Load from file if it exists; later saves go to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let image: StoreImage = serde_json::from_reader(reader)?;

            for record in image.records {
                store.records.insert(record.label.clone(), record);
            }
            for snapshot in image.history {
                store
                    .history
                    .entry(snapshot.label.clone())
                    .or_default()
                    .push(snapshot);
            }
            for mut list in store.history.iter_mut() {
                list.sort_by_key(|s| s.version);
            }
            metrics::record_store_size(store.records.len());
            tracing::info!(
                path = ?path,
                labels = store.records.len(),
                "Loaded config store from file"
            );
        }
        Ok(store)
    }

    /// Write the current state to the persistence path, if one is set.
    ///
    /// The image is written to a sibling temp file and renamed into place.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let image = StoreImage {
            records: self.records.iter().map(|r| r.value().clone()).collect(),
            history: self
                .history
                .iter()
                .flat_map(|r| r.value().clone())
                .collect(),
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &image)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        tracing::debug!(path = ?path, labels = image.records.len(), "Saved config store");
        Ok(())
    }

    /// Number of stored labels.
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

impl ConfigRecordStore for MemoryStore {
    fn find_by_label(&self, label: &str) -> StoreResult<Option<StoredRecord>> {
        Ok(self.records.get(label).map(|r| r.value().clone()))
    }

    fn labels(&self) -> StoreResult<Vec<String>> {
        Ok(self.records.iter().map(|r| r.key().clone()).collect())
    }

    fn insert(&self, record: StoredRecord) -> StoreResult<StoredRecord> {
        match self.records.entry(record.label.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation(record.label)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                metrics::record_store_size(self.records.len());
                Ok(record)
            }
        }
    }

    fn compare_and_swap(
        &self,
        record: StoredRecord,
        expected_version: u64,
    ) -> StoreResult<StoredRecord> {
        let mut slot = self
            .records
            .get_mut(&record.label)
            .ok_or_else(|| StoreError::NotFound(record.label.clone()))?;

        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                label: record.label,
                expected: expected_version,
                actual: slot.version,
            });
        }

        *slot = record.clone();
        Ok(record)
    }
}

impl HistoryArchive for MemoryStore {
    fn append(&self, snapshot: HistorySnapshot) -> StoreResult<()> {
        self.history
            .entry(snapshot.label.clone())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    fn find_by_label(&self, label: &str) -> StoreResult<Vec<HistorySnapshot>> {
        let mut list = self
            .history
            .get(label)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        list.sort_by_key(|s| s.version);
        Ok(list)
    }

    fn find_by_label_and_version(
        &self,
        label: &str,
        version: u64,
    ) -> StoreResult<Option<HistorySnapshot>> {
        Ok(self
            .history
            .get(label)
            .and_then(|list| list.iter().find(|s| s.version == version).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(label: &str, version: u64) -> StoredRecord {
        StoredRecord {
            label: label.to_string(),
            version,
            payload: "[]".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_enforces_unique_label() {
        let store = MemoryStore::new(None);
        store.insert(record("APP1", 1)).unwrap();

        let err = store.insert(record("APP1", 1)).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(ref l) if l == "APP1"));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_compare_and_swap() {
        let store = MemoryStore::new(None);
        store.insert(record("APP1", 1)).unwrap();

        store.compare_and_swap(record("APP1", 2), 1).unwrap();
        let err = store.compare_and_swap(record("APP1", 2), 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 1, actual: 2, .. }
        ));

        let missing = store.compare_and_swap(record("NOPE", 2), 1).unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[test]
    fn test_history_lookups() {
        let store = MemoryStore::new(None);
        store.append(HistorySnapshot::of(&record("APP1", 2))).unwrap();
        store.append(HistorySnapshot::of(&record("APP1", 1))).unwrap();

        let versions: Vec<u64> = HistoryArchive::find_by_label(&store, "APP1")
            .unwrap()
            .iter()
            .map(|s| s.version)
            .collect();
        assert_eq!(versions, vec![1, 2]);
        assert!(store.find_by_label_and_version("APP1", 2).unwrap().is_some());
        assert!(store.find_by_label_and_version("APP1", 3).unwrap().is_none());
        assert!(HistoryArchive::find_by_label(&store, "OTHER").unwrap().is_empty());
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new(Some(path.clone()));
        store.insert(record("APP1", 1)).unwrap();
        store.compare_and_swap(record("APP1", 2), 1).unwrap();
        store.append(HistorySnapshot::of(&record("APP1", 1))).unwrap();
        store.save_to_file().unwrap();

        let loaded = MemoryStore::load_from_file(&path).unwrap();
        let rec = ConfigRecordStore::find_by_label(&loaded, "APP1").unwrap().unwrap();
        assert_eq!(rec.version, 2);
        assert_eq!(HistoryArchive::find_by_label(&loaded, "APP1").unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load_from_file(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.count(), 0);
    }
}
