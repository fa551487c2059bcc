//! Post-commit side effects of a mutation.

use std::sync::Arc;

use crate::dispatch::events::{ChangeEvent, EventDispatcher};
use crate::dispatch::pool::DispatchPool;
use crate::engine::types::{ConfigRecord, MutationKind};
use crate::notifications::NotificationBroker;

/// Fans one committed mutation out to the event handler and to push subscribers.
#[derive(Clone)]
pub struct ChangePublisher {
    events: EventDispatcher,
    broker: Arc<NotificationBroker>,
    pool: DispatchPool,
}

impl ChangePublisher {
    pub fn new(events: EventDispatcher, broker: Arc<NotificationBroker>, pool: DispatchPool) -> Self {
        Self {
            events,
            broker,
            pool,
        }
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn broker(&self) -> &Arc<NotificationBroker> {
        &self.broker
    }

    /// Enqueue one change event and one broadcast. Returns without waiting for either.
    pub fn publish(&self, kind: MutationKind, record: &ConfigRecord) {
        self.events.dispatch(ChangeEvent::new(record.label.clone(), kind));

        let broker = self.broker.clone();
        let label = record.label.clone();
        let version = record.version;
        let updated_at = record.updated_at;
        self.pool.spawn("push_notify", move || {
            broker.notify(&label, version, updated_at);
            Ok(())
        });
    }
}
