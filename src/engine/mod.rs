//! Configuration engine.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs ConfigEngine
//!         → duplicate-key check (no store access on failure)
//!         → ConfigRecordStore read / insert / compare_and_swap
//!         → HistoryArchive append (pre-image, after a committed write)
//!         → ChangePublisher (event + push, fire-and-forget)
//!     → ConfigRecord (entries sorted by key)
//! ```
//!
//! # Design Decisions
//! - Versions start at 1 and grow by exactly 1 per committed mutation
//! - Create relies on the store's unique constraint rather than a pre-read
//! - Lost compare-and-swaps are retried with backoff, then reported as a conflict

pub mod error;
pub mod service;
pub mod types;

pub use error::{ConfigError, ConfigResult};
pub use service::{find_duplicate_keys, ConfigEngine};
pub use types::{ConfigEntry, ConfigRecord, MutationKind};
