//! Storage collaborators.
//!
//! # Data Flow
//! ```text
//! ConfigEngine
//!     → codec.rs (entries ⇄ opaque payload)
//!     → ConfigRecordStore (one row per label, unique on label, CAS on version)
//!     → HistoryArchive (append-only pre-images)
//!
//! memory.rs implements both traits over DashMap, with an optional JSON
//! image on disk.
//! ```
//!
//! # Design Decisions
//! - The engine never checks label existence before insert; the store's
//!   unique constraint is the only authority
//! - Updates are compare-and-swap on the stored version
//! - Payloads are opaque strings to the store

pub mod codec;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;

/// One persisted configuration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub label: String,
    pub version: u64,
    /// Serialized entries, see [`codec`].
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a record taken before a patch or update replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub label: String,
    pub version: u64,
    /// Serialized entries exactly as they were stored.
    pub entries: String,
    pub updated_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

impl HistorySnapshot {
    /// Snapshot the given record.
    pub fn of(record: &StoredRecord) -> Self {
        Self {
            label: record.label.clone(),
            version: record.version,
            entries: record.payload.clone(),
            updated_at: record.updated_at,
            archived_at: Utc::now(),
        }
    }
}

/// Errors raised at the storage boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert collided with an existing label.
    #[error("unique constraint violated for label '{0}'")]
    UniqueViolation(String),

    /// Compare-and-swap lost against a concurrent writer.
    #[error("version conflict on '{label}': expected {expected}, found {actual}")]
    VersionConflict {
        label: String,
        expected: u64,
        actual: u64,
    },

    /// Compare-and-swap target does not exist.
    #[error("no record for label '{0}'")]
    NotFound(String),

    /// Any other infrastructure failure.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage of one record per label.
pub trait ConfigRecordStore: Send + Sync {
    /// Point lookup by label.
    fn find_by_label(&self, label: &str) -> StoreResult<Option<StoredRecord>>;

    /// Every stored label, in no particular order.
    fn labels(&self) -> StoreResult<Vec<String>>;

    /// Insert a new record. Fails with [`StoreError::UniqueViolation`] if the label exists.
    fn insert(&self, record: StoredRecord) -> StoreResult<StoredRecord>;

    /// Replace the record for `record.label` only if its stored version equals `expected_version`.
    fn compare_and_swap(&self, record: StoredRecord, expected_version: u64)
        -> StoreResult<StoredRecord>;
}

/// Append-only store of prior snapshots.
pub trait HistoryArchive: Send + Sync {
    fn append(&self, snapshot: HistorySnapshot) -> StoreResult<()>;

    /// All snapshots for a label, ascending by version.
    fn find_by_label(&self, label: &str) -> StoreResult<Vec<HistorySnapshot>>;

    fn find_by_label_and_version(
        &self,
        label: &str,
        version: u64,
    ) -> StoreResult<Option<HistorySnapshot>>;
}
