//! Typed async client for the config push server.

mod client;
mod stream;

pub use client::{ClientFeedback, ConfigClient, ConfigEntry, ConfigRecord, HistorySnapshot, SdkError};
pub use stream::{Notification, NotificationStream};
