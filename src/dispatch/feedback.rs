//! Client feedback pass-through.
//!
//! Clients report which version they applied; drift and staleness policy
//! belongs entirely to the registered handler.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::pool::{DispatchPool, HandlerError};
use crate::observability::metrics;

/// Acknowledgement reported by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFeedback {
    pub label: String,
    pub client_id: String,
    pub client_version: u64,
    pub last_update_time: DateTime<Utc>,
}

/// External consumer of client feedback.
pub trait FeedbackHandler: Send + Sync {
    fn on_feedback(&self, feedback: &ClientFeedback) -> Result<(), HandlerError>;
}

#[derive(Clone)]
pub struct FeedbackSink {
    handler: Arc<ArcSwapOption<Box<dyn FeedbackHandler>>>,
    pool: DispatchPool,
}

impl FeedbackSink {
    pub fn new(pool: DispatchPool) -> Self {
        Self {
            handler: Arc::new(ArcSwapOption::empty()),
            pool,
        }
    }

    /// Install `handler`, replacing any previous one.
    pub fn register(&self, handler: impl FeedbackHandler + 'static) {
        let boxed: Box<dyn FeedbackHandler> = Box::new(handler);
        self.handler.store(Some(Arc::new(boxed)));
    }

    pub fn clear(&self) {
        self.handler.store(None);
    }

    pub fn has_handler(&self) -> bool {
        self.handler.load().is_some()
    }

    /// Forward `feedback` verbatim. Handler failures are logged, never returned.
    pub fn submit(&self, feedback: ClientFeedback) {
        metrics::record_feedback();
        let Some(handler) = self.handler.load_full() else {
            tracing::trace!(label = %feedback.label, "No feedback handler registered");
            return;
        };

        tracing::debug!(
            label = %feedback.label,
            client_id = %feedback.client_id,
            client_version = feedback.client_version,
            "Forwarding client feedback"
        );
        self.pool
            .spawn("client_feedback", move || handler.on_feedback(&feedback));
    }
}
