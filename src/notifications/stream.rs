//! Subscriber-side notification stream.
//!
//! Opening a stream registers a [`ChannelConnection`] with the broker. The
//! stream ends when the server-side timeout elapses or the broker prunes the
//! connection; dropping it (client disconnect) unsubscribes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::notifications::broker::NotificationBroker;
use crate::notifications::connection::{
    ChannelConnection, ConnectionId, PushConnection, PushNotification,
};

struct Subscription {
    broker: Arc<NotificationBroker>,
    label: String,
    id: ConnectionId,
    rx: mpsc::Receiver<PushNotification>,
    deadline: Instant,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.label, self.id);
    }
}

/// Register a new subscriber for `label` and return its notification stream.
pub fn open_subscription(
    broker: &Arc<NotificationBroker>,
    label: &str,
) -> impl Stream<Item = PushNotification> + Send + 'static {
    let settings = broker.settings();
    let (connection, rx) = ChannelConnection::new(settings.buffer);
    let id = connection.id();
    broker.subscribe(label, Arc::new(connection));

    tracing::info!(label, connection_id = %id, "Subscriber connected");

    let subscription = Subscription {
        broker: broker.clone(),
        label: label.to_string(),
        id,
        rx,
        deadline: Instant::now() + Duration::from_secs(settings.stream_timeout_secs),
    };

    futures_util::stream::unfold(subscription, |mut sub| async move {
        let deadline = sub.deadline;
        let next = tokio::select! {
            msg = sub.rx.recv() => msg,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::debug!(label = %sub.label, connection_id = %sub.id, "Subscription timed out");
                None
            }
        };
        next.map(|notification| (notification, sub))
    })
}
