//! Route handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::dispatch::ClientFeedback;
use crate::engine::{ConfigEntry, ConfigError, ConfigRecord};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::notifications::{open_subscription, PushNotification, CONFIG_UPDATE_EVENT};
use crate::store::HistorySnapshot;

type Entries = Result<Json<Vec<ConfigEntry>>, JsonRejection>;

pub async fn list_labels(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.engine.labels()?))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<ConfigRecord>, ApiError> {
    state
        .engine
        .get(&label)?
        .map(Json)
        .ok_or_else(|| ConfigError::LabelNotFound(label).into())
}

pub async fn create_config(
    State(state): State<AppState>,
    Path(label): Path<String>,
    payload: Entries,
) -> Result<Json<ConfigRecord>, ApiError> {
    let Json(entries) = payload?;
    Ok(Json(state.engine.create(&label, entries)?))
}

pub async fn patch_config(
    State(state): State<AppState>,
    Path(label): Path<String>,
    payload: Entries,
) -> Result<Json<ConfigRecord>, ApiError> {
    let Json(entries) = payload?;
    Ok(Json(state.engine.patch(&label, entries).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    Path(label): Path<String>,
    payload: Entries,
) -> Result<Json<ConfigRecord>, ApiError> {
    let Json(entries) = payload?;
    Ok(Json(state.engine.update(&label, entries).await?))
}

pub async fn list_history(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<Vec<HistorySnapshot>>, ApiError> {
    Ok(Json(state.engine.history(&label)?))
}

pub async fn get_history_version(
    State(state): State<AppState>,
    Path((label, version)): Path<(String, u64)>,
) -> Result<Json<HistorySnapshot>, ApiError> {
    Ok(Json(state.engine.history_version(&label, version)?))
}

/// Accepts client feedback. The handler outcome never reaches the caller.
pub async fn submit_feedback(
    State(state): State<AppState>,
    payload: Result<Json<ClientFeedback>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(feedback) = payload?;
    tracing::debug!(
        label = %feedback.label,
        client_id = %feedback.client_id,
        client_version = feedback.client_version,
        "Client feedback received"
    );
    state.feedback.submit(feedback);
    Ok(StatusCode::OK)
}

/// Long-lived SSE stream of change notifications for one label.
pub async fn subscribe(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let settings = state.broker.settings();
    let events = open_subscription(&state.broker, &label).filter_map(|notification| async move {
        match to_event(&notification) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::error!(
                    label = %notification.label,
                    error = %e,
                    "Failed to encode push notification"
                );
                None
            }
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(settings.keepalive_secs))
            .text("keep-alive"),
    )
}

fn to_event(notification: &PushNotification) -> Result<Event, axum::Error> {
    Event::default()
        .id(notification.id.to_string())
        .event(CONFIG_UPDATE_EVENT)
        .retry(notification.reconnect_delay)
        .json_data(notification)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub service: String,
    pub version: String,
    pub status: String,
    pub labels: Option<usize>,
    pub subscribers: usize,
    pub dispatch_in_flight: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let labels = match state.engine.labels() {
        Ok(labels) => Some(labels.len()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not list labels");
            None
        }
    };
    Json(HealthStatus {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if labels.is_some() { "ok" } else { "degraded" }.to_string(),
        labels,
        subscribers: state.broker.total_subscribers(),
        dispatch_in_flight: state.pool.in_flight(),
    })
}
