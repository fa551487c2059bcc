//! Change events and the single-slot event dispatcher.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::pool::{DispatchPool, HandlerError};
use crate::engine::types::MutationKind;

/// Emitted once per successful mutation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub label: String,
    pub event_type: MutationKind,
    pub event_date: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(label: impl Into<String>, event_type: MutationKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            label: label.into(),
            event_type,
            event_date: Utc::now(),
        }
    }
}

/// External consumer of change events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ChangeEvent) -> Result<(), HandlerError>;
}

type Slot = ArcSwapOption<Box<dyn EventHandler>>;

/// Forwards change events to at most one registered handler.
///
/// Cloning shares the registration slot.
#[derive(Clone)]
pub struct EventDispatcher {
    handler: Arc<Slot>,
    pool: DispatchPool,
}

impl EventDispatcher {
    pub fn new(pool: DispatchPool) -> Self {
        Self {
            handler: Arc::new(ArcSwapOption::empty()),
            pool,
        }
    }

    /// Install `handler`, replacing any previous one.
    pub fn register(&self, handler: impl EventHandler + 'static) {
        let boxed: Box<dyn EventHandler> = Box::new(handler);
        if self.handler.swap(Some(Arc::new(boxed))).is_some() {
            tracing::info!("Replaced registered event handler");
        }
    }

    /// Remove the registered handler, if any.
    pub fn clear(&self) {
        self.handler.store(None);
    }

    pub fn has_handler(&self) -> bool {
        self.handler.load().is_some()
    }

    /// Hand `event` to the handler on the dispatch pool. No-op without a handler.
    pub fn dispatch(&self, event: ChangeEvent) {
        let Some(handler) = self.handler.load_full() else {
            tracing::trace!(label = %event.label, "No event handler registered");
            return;
        };

        tracing::debug!(
            event_id = %event.event_id,
            label = %event.label,
            event_type = ?event.event_type,
            "Dispatching change event"
        );
        self.pool.spawn("change_event", move || handler.on_event(&event));
    }
}
