//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request id, tracing span)
//!     → handlers.rs (extract, call ConfigEngine / FeedbackSink / broker)
//!     → response.rs (ConfigError → status + {"message"})
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Notification streams bypass the request timeout
//! - Handlers only translate; all config semantics live in the engine

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorBody};
pub use server::{AppState, HttpServer};
