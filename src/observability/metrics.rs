//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_mutations_total` (counter): mutations by operation, outcome
//! - `config_mutation_duration_seconds` (histogram): engine latency
//! - `config_labels` (gauge): stored labels
//! - `config_history_append_failures_total` (counter)
//! - `push_notifications_total` (counter): sends by outcome (delivered/stale)
//! - `push_subscribers` (gauge): live subscriber connections
//! - `dispatch_tasks_total` (counter): fire-and-forget tasks by task, outcome
//! - `client_feedback_total` (counter)
//!
//! All recorders are no-ops until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_mutation(operation: &'static str, outcome: &'static str, start: Instant) {
    counter!("config_mutations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    histogram!("config_mutation_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_store_size(labels: usize) {
    gauge!("config_labels").set(labels as f64);
}

pub fn record_history_append_failure() {
    counter!("config_history_append_failures_total").increment(1);
}

pub fn record_notifications(delivered: usize, stale: usize) {
    counter!("push_notifications_total", "outcome" => "delivered").increment(delivered as u64);
    counter!("push_notifications_total", "outcome" => "stale").increment(stale as u64);
}

pub fn record_subscribers(total: usize) {
    gauge!("push_subscribers").set(total as f64);
}

pub fn record_dispatch(task: &'static str, outcome: &'static str) {
    counter!("dispatch_tasks_total", "task" => task, "outcome" => outcome).increment(1);
}

pub fn record_feedback() {
    counter!("client_feedback_total").increment(1);
}
