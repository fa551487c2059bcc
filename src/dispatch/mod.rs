//! Fire-and-forget hand-off to external collaborators.
//!
//! # Data Flow
//! ```text
//! ConfigEngine commit
//!     → publisher.rs
//!         → events.rs  EventDispatcher → registered EventHandler (optional)
//!         → NotificationBroker::notify
//!
//! POST /config/feedback
//!     → feedback.rs FeedbackSink → registered FeedbackHandler (optional)
//!
//! Every hand-off runs on pool.rs (bounded, off the request path).
//! ```
//!
//! # Design Decisions
//! - One registration slot per handler kind; absence is a valid no-op state
//! - Handler errors and panics are logged and counted, never propagated
//! - No ordering guarantee between tasks, even for the same label

pub mod events;
pub mod feedback;
pub mod pool;
pub mod publisher;
pub mod webhook;

pub use events::{ChangeEvent, EventDispatcher, EventHandler};
pub use feedback::{ClientFeedback, FeedbackHandler, FeedbackSink};
pub use pool::{DispatchPool, HandlerError};
pub use publisher::ChangePublisher;
pub use webhook::{WebhookError, WebhookHandler};
