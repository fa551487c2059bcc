//! Engine error taxonomy.
//!
//! Display strings double as the client-facing messages.

use thiserror::Error;

use crate::store::codec::CodecError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Incoming batch repeats keys. Checked before any store access.
    #[error("Duplicate Keys: {}", .0.join(","))]
    DuplicateKeys(Vec<String>),

    /// Create lost against an existing label.
    #[error("Label Already Exists")]
    LabelAlreadyExists(String),

    /// Read or mutation against an unknown label.
    #[error("Label Not Found")]
    LabelNotFound(String),

    /// Entries could not be encoded or decoded.
    #[error("Invalid Config")]
    InvalidConfig(#[source] CodecError),

    /// Archived version lookup missed.
    #[error("Version Not Found")]
    VersionNotFound { label: String, version: u64 },

    /// Compare-and-swap kept losing to concurrent writers.
    #[error("Version Conflict")]
    Conflict { label: String, attempts: u32 },

    /// Store failure other than a unique-constraint violation.
    #[error("Storage Unavailable")]
    StorageUnavailable(#[source] StoreError),
}

impl ConfigError {
    /// Short metric/log tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::DuplicateKeys(_) => "duplicate_keys",
            ConfigError::LabelAlreadyExists(_) => "label_exists",
            ConfigError::LabelNotFound(_) => "label_not_found",
            ConfigError::InvalidConfig(_) => "invalid_config",
            ConfigError::VersionNotFound { .. } => "version_not_found",
            ConfigError::Conflict { .. } => "conflict",
            ConfigError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

/// Result type for engine operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
