//! Per-label registry of live push connections.
//!
//! # Responsibilities
//! - Track subscriber connections grouped by label
//! - Broadcast change notifications to a label's subscribers
//! - Prune connections whose send failed
//!
//! # Design Decisions
//! - Broadcast iterates a cloned snapshot; no registry lock is held while sending
//! - Stale connections are removed in a second pass after the broadcast
//! - A label whose set becomes empty is dropped from the registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::notifications::connection::{ConnectionId, PushConnection, PushNotification};
use crate::observability::metrics;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
}

pub struct NotificationBroker {
    registry: DashMap<String, Vec<Arc<dyn PushConnection>>>,
    settings: ArcSwap<NotificationConfig>,
    live: AtomicUsize,
}

impl NotificationBroker {
    pub fn new(settings: NotificationConfig) -> Self {
        Self {
            registry: DashMap::new(),
            settings: ArcSwap::from_pointee(settings),
            live: AtomicUsize::new(0),
        }
    }

    /// Current notification settings.
    pub fn settings(&self) -> Arc<NotificationConfig> {
        self.settings.load_full()
    }

    /// Swap in new settings; applies to subsequent subscriptions and broadcasts.
    pub fn apply_settings(&self, settings: NotificationConfig) {
        if *self.settings.load_full() != settings {
            tracing::info!(
                reconnect_delay_ms = settings.reconnect_delay_ms,
                keepalive_secs = settings.keepalive_secs,
                stream_timeout_secs = settings.stream_timeout_secs,
                buffer = settings.buffer,
                "Notification settings updated"
            );
            self.settings.store(Arc::new(settings));
        }
    }

    /// Add `connection` to the set for `label`.
    pub fn subscribe(&self, label: &str, connection: Arc<dyn PushConnection>) {
        let id = connection.id();
        let total = {
            let mut set = self.registry.entry(label.to_string()).or_default();
            if set.iter().any(|c| c.id() == id) {
                return;
            }
            set.push(connection);
            // Counted under the shard lock so a racing remove never underflows.
            self.live.fetch_add(1, Ordering::Relaxed) + 1
        };
        metrics::record_subscribers(total);
        tracing::debug!(label, connection_id = %id, "Subscriber added");
    }

    /// Remove the connection `id` from `label`. Unknown label or id is a no-op.
    pub fn unsubscribe(&self, label: &str, id: ConnectionId) -> bool {
        let removed = self.remove(label, &[id]) == 1;
        if removed {
            tracing::debug!(label, connection_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Broadcast a change of `label` to its current subscribers.
    pub fn notify(&self, label: &str, version: u64, updated_at: DateTime<Utc>) -> NotifyReport {
        let snapshot: Vec<Arc<dyn PushConnection>> = match self.registry.get(label) {
            Some(set) => set.clone(),
            None => return NotifyReport::default(),
        };

        let notification = PushNotification {
            id: Uuid::new_v4(),
            label: label.to_string(),
            version,
            updated_at,
            reconnect_delay: Duration::from_millis(self.settings.load().reconnect_delay_ms),
        };

        let mut stale = Vec::new();
        for connection in &snapshot {
            if let Err(e) = connection.send(&notification) {
                tracing::debug!(
                    label,
                    connection_id = %connection.id(),
                    error = %e,
                    "Push failed, marking connection stale"
                );
                stale.push(connection.id());
            }
        }

        let pruned = if stale.is_empty() { 0 } else { self.remove(label, &stale) };
        let report = NotifyReport {
            attempted: snapshot.len(),
            delivered: snapshot.len() - stale.len(),
            pruned,
        };
        metrics::record_notifications(report.delivered, stale.len());
        tracing::debug!(
            label,
            version,
            notification_id = %notification.id,
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned,
            "Broadcast complete"
        );
        report
    }

    pub fn subscriber_count(&self, label: &str) -> usize {
        self.registry.get(label).map(|set| set.len()).unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Drop every connection, ending all open streams. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.registry.retain(|_, set| {
            closed += set.len();
            self.live.fetch_sub(set.len(), Ordering::Relaxed);
            false
        });
        if closed > 0 {
            tracing::info!(closed, "Closed all subscriber connections");
            metrics::record_subscribers(self.live.load(Ordering::Relaxed));
        }
        closed
    }

    fn remove(&self, label: &str, ids: &[ConnectionId]) -> usize {
        let removed = match self.registry.get_mut(label) {
            Some(mut set) => {
                let before = set.len();
                set.retain(|c| !ids.contains(&c.id()));
                let removed = before - set.len();
                if removed > 0 {
                    self.live.fetch_sub(removed, Ordering::Relaxed);
                }
                removed
            }
            None => 0,
        };
        self.registry.remove_if(label, |_, set| set.is_empty());

        if removed > 0 {
            metrics::record_subscribers(self.live.load(Ordering::Relaxed));
        }
        removed
    }
}
