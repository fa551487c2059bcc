//! Bounded pool for fire-and-forget work.
//!
//! # Responsibilities
//! - Run work off the caller's execution path
//! - Bound concurrent work via semaphore
//! - Isolate failures (errors and panics) per task
//!
//! # Design Decisions
//! - `spawn` never blocks: the permit is awaited inside the spawned task
//! - The semaphore caps running work only; tasks waiting for a permit are not
//!   bounded, so a slow handler grows the backlog (visible as
//!   `dispatchInFlight` on `/health` staying at the limit)
//! - Work runs on the blocking pool since external handlers are synchronous
//!   and may perform I/O
//! - No completion signal is returned to the submitter

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::observability::metrics;

/// Error type returned by external handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A bounded fire-and-forget task pool.
///
/// Must be used from within a Tokio runtime.
#[derive(Clone, Debug)]
pub struct DispatchPool {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl DispatchPool {
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Submit `work` and return immediately.
    ///
    /// An `Err` returned by `work` or a panic inside it is logged under the
    /// `task` name and never reaches the submitter.
    pub fn spawn<F>(&self, task: &'static str, work: F)
    where
        F: FnOnce() -> Result<(), HandlerError> + Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!(task, "Dispatch pool closed, dropping task");
                return;
            };

            match tokio::task::spawn_blocking(work).await {
                Ok(Ok(())) => metrics::record_dispatch(task, "ok"),
                Ok(Err(e)) => {
                    tracing::warn!(task, error = %e, "Dispatch task failed");
                    metrics::record_dispatch(task, "error");
                }
                Err(join) if join.is_panic() => {
                    tracing::error!(task, "Dispatch task panicked");
                    metrics::record_dispatch(task, "panic");
                }
                Err(join) => {
                    tracing::warn!(task, error = %join, "Dispatch task cancelled");
                    metrics::record_dispatch(task, "cancelled");
                }
            }
        });
    }

    /// Tasks currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }
}
