//! Config push server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──HTTP──▶ http (router, handlers)
//!                        │
//!                        ▼
//!                    engine (ConfigEngine) ──▶ store (records + history)
//!                        │ commit
//!                        ▼
//!                    dispatch (pool) ──▶ event / feedback handlers (webhooks)
//!                        │
//!                        ▼
//!                    notifications (broker) ──SSE──▶ subscribed clients
//!
//!   Cross-cutting: config (TOML + watcher), observability, lifecycle, resilience
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use config_push_server::config::validation::validate_config;
use config_push_server::config::watcher::ConfigWatcher;
use config_push_server::config::{load_config, ServerConfig};
use config_push_server::dispatch::WebhookHandler;
use config_push_server::http::HttpServer;
use config_push_server::lifecycle::{wait_for_signal, Shutdown};
use config_push_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "config-push-server", version)]
#[command(about = "Centralized configuration service with live push notifications")]
struct Args {
    /// Path to the TOML server config. Defaults apply when omitted.
    #[arg(short, long, env = "CONFIG_PUSH_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ServerConfig::default();
            if let Err(errors) = validate_config(&config) {
                for e in &errors {
                    eprintln!("invalid default config: {e}");
                }
                return Err("invalid default config".into());
            }
            config
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("config-push-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        persistence = ?config.storage.persistence_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (mpsc::unbounded_channel().1, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let server = HttpServer::new(config.clone())?;
    register_webhooks(&server, &config);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_webhooks(server: &HttpServer, config: &ServerConfig) {
    let timeout = Duration::from_secs(config.hooks.timeout_secs);

    if let Some(url) = &config.hooks.event_webhook_url {
        match WebhookHandler::new(url, timeout) {
            Ok(handler) => {
                tracing::info!(url = %handler.url(), "Change events forwarded to webhook");
                server.state().events().register(handler);
            }
            Err(e) => tracing::error!(url, error = %e, "Event webhook not registered"),
        }
    }

    if let Some(url) = &config.hooks.feedback_webhook_url {
        match WebhookHandler::new(url, timeout) {
            Ok(handler) => {
                tracing::info!(url = %handler.url(), "Client feedback forwarded to webhook");
                server.state().feedback.register(handler);
            }
            Err(e) => tracing::error!(url, error = %e, "Feedback webhook not registered"),
        }
    }
}
