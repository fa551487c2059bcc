//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, buffers > 0)
//! - Validate addresses and webhook URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("notifications.reconnect_delay_ms", config.notifications.reconnect_delay_ms),
        ("notifications.keepalive_secs", config.notifications.keepalive_secs),
        ("notifications.stream_timeout_secs", config.notifications.stream_timeout_secs),
        ("notifications.buffer", config.notifications.buffer as u64),
        ("dispatch.max_in_flight", config.dispatch.max_in_flight as u64),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("hooks.timeout_secs", config.hooks.timeout_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    check_url(&mut errors, "hooks.event_webhook_url", config.hooks.event_webhook_url.as_deref());
    check_url(
        &mut errors,
        "hooks.feedback_webhook_url",
        config.hooks.feedback_webhook_url.as_deref(),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: Option<&str>) {
    let Some(value) = value else { return };
    let valid = Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
