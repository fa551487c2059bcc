//! Push connections.
//!
//! The broker only ever writes to a connection. Transport lifecycle stays
//! with whoever created it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// SSE event name carried by every push notification.
pub const CONFIG_UPDATE_EVENT: &str = "CONFIG-UPDATE-EVENT";

pub type ConnectionId = Uuid;

/// Change notice delivered to every live subscriber of a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub id: Uuid,
    pub label: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    /// Suggested client reconnect delay; sent as the SSE `retry` field.
    #[serde(skip)]
    pub reconnect_delay: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("connection closed")]
    Closed,

    #[error("connection buffer full")]
    Full,

    #[error("transport error: {0}")]
    Transport(String),
}

/// A live subscriber connection.
pub trait PushConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Attempt delivery without blocking. Any error marks the connection stale.
    fn send(&self, notification: &PushNotification) -> Result<(), PushError>;
}

/// Connection backed by a bounded channel; the receiving half feeds an SSE stream.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<PushNotification>,
}

impl ChannelConnection {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PushNotification>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }
}

impl PushConnection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        self.tx
            .try_send(notification.clone())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PushError::Full,
                mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> PushNotification {
        PushNotification {
            id: Uuid::new_v4(),
            label: "APP1".into(),
            version: 2,
            updated_at: Utc::now(),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_channel_send_errors() {
        let (conn, mut rx) = ChannelConnection::new(1);
        conn.send(&notification()).unwrap();
        assert_eq!(conn.send(&notification()), Err(PushError::Full));

        assert_eq!(rx.try_recv().unwrap().version, 2);
        drop(rx);
        assert_eq!(conn.send(&notification()), Err(PushError::Closed));
    }

    #[test]
    fn test_payload_omits_reconnect_hint() {
        let json = serde_json::to_value(notification()).unwrap();
        assert_eq!(json["version"], 2);
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("reconnectDelay").is_none());
    }
}
