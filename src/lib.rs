//! Centralized configuration service with live push notifications.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod notifications;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::ServerConfig;
pub use engine::{ConfigEngine, ConfigEntry, ConfigError, ConfigRecord};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
