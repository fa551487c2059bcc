//! Configuration data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One key/value/description triple within a configuration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
}

impl ConfigEntry {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

/// The current state of one labeled configuration set.
///
/// Entries are always sorted ascending by key so clients can compare results
/// without re-sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub label: String,
    pub version: u64,
    #[serde(rename = "configData")]
    pub entries: Vec<ConfigEntry>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigRecord {
    /// Look up an entry by key.
    pub fn entry(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries
            .binary_search_by(|e| e.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// Kind of mutation that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    Create,
    Patch,
    Update,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Patch => "patch",
            MutationKind::Update => "update",
        }
    }
}
