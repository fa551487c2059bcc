//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! patch/update loses a compare-and-swap
//!     → backoff.rs (jittered exponential delay)
//!     → re-read, re-merge, retry until retries.max_attempts
//! ```
//!
//! # Design Decisions
//! - Jittered backoff keeps contending writers from retrying in lockstep
//! - Retries are bounded; exhaustion is reported as a conflict

pub mod backoff;
