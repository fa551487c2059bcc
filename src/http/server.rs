//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wire the engine, broker and feedback sink into shared state
//! - Create the Axum router with all handlers
//! - Wire up middleware (request id, tracing, timeouts, body limits, CORS)
//! - Apply hot-reloaded notification settings
//! - Flush the reference store periodically and on shutdown

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::dispatch::{ChangePublisher, DispatchPool, EventDispatcher, FeedbackSink};
use crate::engine::ConfigEngine;
use crate::http::handlers;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::notifications::NotificationBroker;
use crate::store::{ConfigRecordStore, HistoryArchive, MemoryStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConfigEngine>,
    pub feedback: FeedbackSink,
    pub broker: Arc<NotificationBroker>,
    pub pool: DispatchPool,
}

impl AppState {
    /// Assemble the engine and its collaborators over the given stores.
    pub fn new(
        config: &ServerConfig,
        records: Arc<dyn ConfigRecordStore>,
        history: Arc<dyn HistoryArchive>,
    ) -> Self {
        let pool = DispatchPool::new(config.dispatch.max_in_flight);
        let broker = Arc::new(NotificationBroker::new(config.notifications.clone()));
        let publisher = ChangePublisher::new(EventDispatcher::new(pool.clone()), broker.clone(), pool.clone());
        let engine = ConfigEngine::new(records, history, publisher, config.retries.clone());

        Self {
            engine: Arc::new(engine),
            feedback: FeedbackSink::new(pool.clone()),
            broker,
            pool,
        }
    }

    pub fn events(&self) -> &EventDispatcher {
        self.engine.publisher().events()
    }
}

/// HTTP server for the config service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    state: AppState,
    /// Present when the server owns a persistable reference store.
    store: Option<MemoryStore>,
}

impl HttpServer {
    /// Create a server over the in-memory reference store, loading the
    /// persisted image when `storage.persistence_path` is set.
    pub fn new(config: ServerConfig) -> std::io::Result<Self> {
        let store = match &config.storage.persistence_path {
            Some(path) => MemoryStore::load_from_file(PathBuf::from(path))?,
            None => MemoryStore::new(None),
        };
        let state = AppState::new(&config, Arc::new(store.clone()), Arc::new(store.clone()));
        let router = Self::build_router(&config, state.clone());

        Ok(Self {
            router,
            config,
            state,
            store: Some(store),
        })
    }

    /// Create a server over externally provided stores. Nothing is flushed.
    pub fn with_stores(
        config: ServerConfig,
        records: Arc<dyn ConfigRecordStore>,
        history: Arc<dyn HistoryArchive>,
    ) -> Self {
        let state = AppState::new(&config, records, history);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
            store: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request timeout wraps every route except the notification stream.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/config", get(handlers::list_labels))
            .route("/config/", get(handlers::list_labels))
            .route("/config/feedback", post(handlers::submit_feedback))
            .route(
                "/config/{label}",
                get(handlers::get_config)
                    .post(handlers::create_config)
                    .patch(handlers::patch_config)
                    .put(handlers::update_config),
            )
            .route("/config/{label}/history", get(handlers::list_history))
            .route(
                "/config/{label}/history/{version}",
                get(handlers::get_history_version),
            )
            .route("/health", get(handlers::health))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        let streams = Router::new().route("/config/notification/{label}", get(handlers::subscribe));

        let cors = if config.security.allow_any_origin {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        };

        api.merge(streams)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(cors)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| make_span(request)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Shared state, for registering handlers before serving.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A clone of the fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Reloaded configs arriving on `config_updates` update the notification
    /// settings; other sections are ignored until restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let broker = self.state.broker.clone();
        let reload = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                broker.apply_settings(new_config.notifications);
                tracing::info!("Applied reloaded notification settings; other sections take effect on restart");
            }
        });

        let flush = self
            .store
            .clone()
            .filter(|_| self.config.storage.persistence_path.is_some())
            .filter(|_| self.config.storage.flush_interval_secs > 0)
            .map(|store| {
                let every = Duration::from_secs(self.config.storage.flush_interval_secs);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if let Err(e) = store.save_to_file() {
                            tracing::error!(error = %e, "Periodic store flush failed");
                        }
                    }
                })
            });

        let broker = self.state.broker.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
                // Open streams would otherwise hold the drain until their timeout.
                broker.close_all();
            })
            .await?;

        reload.abort();
        if let Some(flush) = flush {
            flush.abort();
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.save_to_file() {
                tracing::error!(error = %e, "Final store flush failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
