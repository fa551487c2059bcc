use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Response;
use serde::Deserialize;

use crate::client::SdkError;

const CONFIG_UPDATE_EVENT: &str = "CONFIG-UPDATE-EVENT";

/// One change notification pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub label: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    /// Reconnect hint sent alongside the event, if any.
    #[serde(skip)]
    pub retry: Option<Duration>,
}

/// Server-sent event stream of [`Notification`]s.
pub struct NotificationStream {
    response: Response,
    frames: FrameBuffer,
}

impl NotificationStream {
    pub(crate) fn new(response: Response) -> Self {
        Self {
            response,
            frames: FrameBuffer::default(),
        }
    }

    /// Next notification, or `None` once the server closes the stream.
    /// Keep-alive comments are skipped.
    pub async fn next(&mut self) -> Result<Option<Notification>, SdkError> {
        loop {
            if let Some(notification) = self.frames.next_notification() {
                return Ok(Some(notification));
            }
            match self.response.chunk().await? {
                Some(chunk) => self.frames.push(&chunk),
                None => return Ok(None),
            }
        }
    }
}

/// Raw bytes received so far. Text is decoded only once a whole frame is
/// present, so a character split across chunks survives.
#[derive(Default)]
struct FrameBuffer {
    bytes: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    fn next_notification(&mut self) -> Option<Notification> {
        while let Some(end) = self.bytes.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.bytes.drain(..end + 2).collect();
            if let Some(notification) = std::str::from_utf8(&frame).ok().and_then(parse_frame) {
                return Some(notification);
            }
        }
        None
    }
}

fn parse_frame(frame: &str) -> Option<Notification> {
    let mut event = None;
    let mut retry = None;
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            event = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("retry:") {
            retry = v.trim().parse().ok().map(Duration::from_millis);
        } else if let Some(v) = line.strip_prefix("data:") {
            data.push_str(v.trim_start());
        }
    }
    if event != Some(CONFIG_UPDATE_EVENT) || data.is_empty() {
        return None;
    }
    let mut notification: Notification = serde_json::from_str(&data).ok()?;
    notification.retry = retry;
    Some(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_frame() {
        let frame = "id: 1\nevent: CONFIG-UPDATE-EVENT\nretry: 5000\ndata: {\"id\":\"1\",\"label\":\"APP1\",\"version\":2,\"updatedAt\":\"2024-01-01T00:00:00Z\"}\n\n";
        let n = parse_frame(frame).unwrap();
        assert_eq!(n.label, "APP1");
        assert_eq!(n.version, 2);
        assert_eq!(n.retry, Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_multibyte_label_split_across_chunks() {
        let frame = "event: CONFIG-UPDATE-EVENT\r\ndata: {\"id\":\"1\",\"label\":\"CAFÉ\",\"version\":3,\"updatedAt\":\"2024-01-01T00:00:00Z\"}\r\n\r\n";
        let bytes = frame.as_bytes();
        // Split right after the first byte of the two-byte É.
        let split = frame.find('É').unwrap() + 1;

        let mut frames = FrameBuffer::default();
        frames.push(&bytes[..split]);
        assert!(frames.next_notification().is_none());
        frames.push(&bytes[split..]);

        let n = frames.next_notification().unwrap();
        assert_eq!(n.label, "CAFÉ");
        assert_eq!(n.version, 3);
        assert!(frames.next_notification().is_none());
    }

    #[test]
    fn test_keep_alive_then_update_in_one_chunk() {
        let mut frames = FrameBuffer::default();
        frames.push(b": keep-alive\n\nevent: CONFIG-UPDATE-EVENT\ndata: {\"id\":\"2\",\"label\":\"APP1\",\"version\":4,\"updatedAt\":\"2024-01-01T00:00:00Z\"}\n\n");
        assert_eq!(frames.next_notification().unwrap().version, 4);
    }

    #[test]
    fn test_keep_alive_is_skipped() {
        assert!(parse_frame(": keep-alive\n\n").is_none());
    }
}
