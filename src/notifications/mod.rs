//! Live notification fan-out.
//!
//! # Data Flow
//! ```text
//! GET /config/notification/{label}
//!     → stream.rs (ChannelConnection registered, stream returned as SSE)
//!
//! ConfigEngine commit
//!     → dispatch pool
//!     → broker.rs notify(label, version, updatedAt)
//!     → snapshot of the label's connections
//!     → send to each; failures collected
//!     → prune failures after the loop
//! ```
//!
//! # Design Decisions
//! - Registry is process-wide, empty at start, shrinks only through unsubscribe/prune
//! - Connections are write-only from the broker's point of view
//! - No cancellation of an in-flight broadcast

pub mod broker;
pub mod connection;
pub mod stream;

pub use broker::{NotificationBroker, NotifyReport};
pub use connection::{
    ChannelConnection, ConnectionId, PushConnection, PushError, PushNotification,
    CONFIG_UPDATE_EVENT,
};
pub use stream::open_subscription;
