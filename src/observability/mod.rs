//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Labels, versions and connection ids are structured fields, not message text
//! - Metrics are cheap (atomic increments) and safe before the exporter is installed

pub mod logging;
pub mod metrics;
