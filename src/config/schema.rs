//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the config server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Push notification settings. Hot-reloadable.
    pub notifications: NotificationConfig,

    /// Fire-and-forget dispatch settings.
    pub dispatch: DispatchConfig,

    /// Optimistic-concurrency retry settings for patch/update.
    pub retries: RetryConfig,

    /// Reference store settings.
    pub storage: StorageConfig,

    /// External handler webhooks.
    pub hooks: HooksConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// HTTP hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout for non-streaming routes, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Push notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Reconnect delay hint sent to subscribers, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Interval between SSE keep-alive comments, in seconds.
    pub keepalive_secs: u64,

    /// Server-side lifetime of one subscription stream, in seconds.
    pub stream_timeout_secs: u64,

    /// Undelivered notifications buffered per connection before it counts as stale.
    pub buffer: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5_000,
            keepalive_secs: 15,
            stream_timeout_secs: 30 * 60,
            buffer: 16,
        }
    }
}

/// Dispatch worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum fire-and-forget tasks running at once.
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_in_flight: 64 }
    }
}

/// Retry configuration for version conflicts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for one patch/update, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 5,
            max_delay_ms: 200,
        }
    }
}

/// Reference store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON image loaded at startup and written on flush. `None` keeps state in memory only.
    pub persistence_path: Option<String>,

    /// Periodic flush interval in seconds (0 = flush on shutdown only).
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            flush_interval_secs: 30,
        }
    }
}

/// Webhooks backing the optional event and feedback handler slots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HooksConfig {
    /// URL receiving every change event as a JSON POST.
    pub event_webhook_url: Option<String>,

    /// URL receiving every client feedback report as a JSON POST.
    pub feedback_webhook_url: Option<String>,

    /// Webhook request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            event_webhook_url: None,
            feedback_webhook_url: None,
            timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Answer CORS preflights for any origin.
    pub allow_any_origin: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            allow_any_origin: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [notifications]
            reconnect_delay_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.notifications.reconnect_delay_ms, 1000);
        assert_eq!(config.notifications.buffer, 16);
        assert_eq!(config.retries.max_attempts, 5);
        assert!(config.storage.persistence_path.is_none());
    }
}
