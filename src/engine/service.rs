//! Versioned configuration mutation engine.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::config::RetryConfig;
use crate::dispatch::ChangePublisher;
use crate::engine::error::{ConfigError, ConfigResult};
use crate::engine::types::{ConfigEntry, ConfigRecord, MutationKind};
use crate::observability::metrics;
use crate::resilience::backoff::conflict_backoff;
use crate::store::codec::{decode_entries, encode_entries};
use crate::store::{
    ConfigRecordStore, HistoryArchive, HistorySnapshot, StoreError, StoredRecord,
};

/// Owns every invariant of a labeled config set: unique keys, version
/// arithmetic, history archiving and post-commit publication.
pub struct ConfigEngine {
    records: Arc<dyn ConfigRecordStore>,
    history: Arc<dyn HistoryArchive>,
    publisher: ChangePublisher,
    retries: RetryConfig,
}

impl ConfigEngine {
    pub fn new(
        records: Arc<dyn ConfigRecordStore>,
        history: Arc<dyn HistoryArchive>,
        publisher: ChangePublisher,
        retries: RetryConfig,
    ) -> Self {
        Self {
            records,
            history,
            publisher,
            retries,
        }
    }

    pub fn publisher(&self) -> &ChangePublisher {
        &self.publisher
    }

    /// All labels, upper-cased and sorted ascending.
    pub fn labels(&self) -> ConfigResult<Vec<String>> {
        let mut labels: Vec<String> = self
            .records
            .labels()
            .map_err(storage_failure)?
            .into_iter()
            .map(|l| l.to_uppercase())
            .collect();
        labels.sort();
        Ok(labels)
    }

    /// Current record for `label`, if any.
    pub fn get(&self, label: &str) -> ConfigResult<Option<ConfigRecord>> {
        self.records
            .find_by_label(label)
            .map_err(storage_failure)?
            .map(|stored| to_record(&stored))
            .transpose()
    }

    /// Create `label` at version 1.
    ///
    /// Existence is decided by the store's unique constraint, not by a prior read.
    pub fn create(&self, label: &str, entries: Vec<ConfigEntry>) -> ConfigResult<ConfigRecord> {
        let start = Instant::now();
        let result = self.try_create(label, entries);
        metrics::record_mutation("create", outcome(&result), start);
        result
    }

    /// Upsert `entries` by key into the existing set; other keys are kept.
    pub async fn patch(&self, label: &str, entries: Vec<ConfigEntry>) -> ConfigResult<ConfigRecord> {
        self.mutate(MutationKind::Patch, label, entries).await
    }

    /// Replace the whole entry set with `entries`.
    pub async fn update(&self, label: &str, entries: Vec<ConfigEntry>) -> ConfigResult<ConfigRecord> {
        self.mutate(MutationKind::Update, label, entries).await
    }

    /// Archived snapshots of `label`, ascending by version.
    pub fn history(&self, label: &str) -> ConfigResult<Vec<HistorySnapshot>> {
        let snapshots = self.history.find_by_label(label).map_err(storage_failure)?;
        if snapshots.is_empty() && self.get(label)?.is_none() {
            return Err(ConfigError::LabelNotFound(label.to_string()));
        }
        Ok(snapshots)
    }

    /// The snapshot archived when `label` left `version`.
    pub fn history_version(&self, label: &str, version: u64) -> ConfigResult<HistorySnapshot> {
        self.history
            .find_by_label_and_version(label, version)
            .map_err(storage_failure)?
            .ok_or_else(|| ConfigError::VersionNotFound {
                label: label.to_string(),
                version,
            })
    }

    fn try_create(&self, label: &str, entries: Vec<ConfigEntry>) -> ConfigResult<ConfigRecord> {
        ensure_unique_keys(&entries)?;

        let entries = sorted(entries);
        let payload = encode_entries(&entries).map_err(ConfigError::InvalidConfig)?;
        let stored = self
            .records
            .insert(StoredRecord {
                label: label.to_string(),
                version: 1,
                payload,
                updated_at: Utc::now(),
            })
            .map_err(|e| match e {
                StoreError::UniqueViolation(label) => ConfigError::LabelAlreadyExists(label),
                other => storage_failure(other),
            })?;

        let record = ConfigRecord {
            label: stored.label,
            version: stored.version,
            entries,
            updated_at: stored.updated_at,
        };
        tracing::info!(label, version = record.version, "Config created");
        self.publisher.publish(MutationKind::Create, &record);
        Ok(record)
    }

    async fn mutate(
        &self,
        kind: MutationKind,
        label: &str,
        entries: Vec<ConfigEntry>,
    ) -> ConfigResult<ConfigRecord> {
        let start = Instant::now();
        let result = self.try_mutate(kind, label, entries).await;
        metrics::record_mutation(kind.as_str(), outcome(&result), start);
        result
    }

    /// Read-merge-CAS loop. Each lost CAS re-reads the winner's record.
    async fn try_mutate(
        &self,
        kind: MutationKind,
        label: &str,
        entries: Vec<ConfigEntry>,
    ) -> ConfigResult<ConfigRecord> {
        ensure_unique_keys(&entries)?;

        let max_attempts = self.retries.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self
                .records
                .find_by_label(label)
                .map_err(storage_failure)?
                .ok_or_else(|| ConfigError::LabelNotFound(label.to_string()))?;

            let next_entries = match kind {
                MutationKind::Patch => {
                    let existing = decode_entries(&current.payload).map_err(ConfigError::InvalidConfig)?;
                    merge(existing, &entries)
                }
                _ => sorted(entries.clone()),
            };
            let payload = encode_entries(&next_entries).map_err(ConfigError::InvalidConfig)?;
            let next = StoredRecord {
                label: current.label.clone(),
                version: current.version + 1,
                payload,
                updated_at: Utc::now(),
            };

            match self.records.compare_and_swap(next, current.version) {
                Ok(saved) => {
                    self.archive(&current);
                    let record = ConfigRecord {
                        label: saved.label,
                        version: saved.version,
                        entries: next_entries,
                        updated_at: saved.updated_at,
                    };
                    tracing::info!(
                        label,
                        version = record.version,
                        operation = kind.as_str(),
                        attempt,
                        "Config mutated"
                    );
                    self.publisher.publish(kind, &record);
                    return Ok(record);
                }
                Err(StoreError::VersionConflict { actual, .. }) => {
                    if attempt >= max_attempts {
                        tracing::warn!(label, attempts = attempt, "Giving up after version conflicts");
                        return Err(ConfigError::Conflict {
                            label: label.to_string(),
                            attempts: attempt,
                        });
                    }
                    let delay = conflict_backoff(attempt, &self.retries);
                    tracing::debug!(
                        label,
                        expected = current.version,
                        actual,
                        attempt,
                        delay = ?delay,
                        "Version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::NotFound(label)) => return Err(ConfigError::LabelNotFound(label)),
                Err(other) => return Err(storage_failure(other)),
            }
        }
    }

    /// Append the pre-image. The new record is already committed, so a failure
    /// here is logged rather than returned.
    fn archive(&self, previous: &StoredRecord) {
        if let Err(e) = self.history.append(HistorySnapshot::of(previous)) {
            tracing::error!(
                label = %previous.label,
                version = previous.version,
                error = %e,
                "Failed to archive config snapshot"
            );
            metrics::record_history_append_failure();
        }
    }
}

/// Keys repeated within `entries`, each reported once in order of first repetition.
pub fn find_duplicate_keys(entries: &[ConfigEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for entry in entries {
        if !seen.insert(entry.key.as_str()) && reported.insert(entry.key.as_str()) {
            duplicates.push(entry.key.clone());
        }
    }
    duplicates
}

fn ensure_unique_keys(entries: &[ConfigEntry]) -> ConfigResult<()> {
    let duplicates = find_duplicate_keys(entries);
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::DuplicateKeys(duplicates))
    }
}

fn merge(existing: Vec<ConfigEntry>, incoming: &[ConfigEntry]) -> Vec<ConfigEntry> {
    let mut by_key: BTreeMap<String, ConfigEntry> =
        existing.into_iter().map(|e| (e.key.clone(), e)).collect();
    for entry in incoming {
        by_key.insert(entry.key.clone(), entry.clone());
    }
    by_key.into_values().collect()
}

fn sorted(mut entries: Vec<ConfigEntry>) -> Vec<ConfigEntry> {
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn to_record(stored: &StoredRecord) -> ConfigResult<ConfigRecord> {
    let entries = decode_entries(&stored.payload).map_err(|e| {
        tracing::error!(label = %stored.label, error = %e, "Stored payload is not decodable");
        ConfigError::InvalidConfig(e)
    })?;
    Ok(ConfigRecord {
        label: stored.label.clone(),
        version: stored.version,
        entries: sorted(entries),
        updated_at: stored.updated_at,
    })
}

fn storage_failure(e: StoreError) -> ConfigError {
    tracing::error!(error = %e, "Config store failure");
    ConfigError::StorageUnavailable(e)
}

fn outcome<T>(result: &ConfigResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
