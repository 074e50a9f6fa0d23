use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{event::Event, storage::EventStorage};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn EventStorage>,
}

/// Request body of `POST /event` and `DELETE /event`.
///
/// Deletion only reads `chat_id` and `timestamp`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventForm {
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

type ApiError = (StatusCode, &'static str);

pub fn routes(storage: Arc<dyn EventStorage>) -> Router {
    Router::new()
        .route("/event", post(create_event).delete(delete_event))
        .route("/events", get(list_events))
        .with_state(AppState { storage })
}

/// Serves the API until `shutdown` is cancelled, then drains open connections.
pub async fn serve(
    listener: TcpListener,
    storage: Arc<dyn EventStorage>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, routes(storage))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server error")
}

/// Runs [`serve`] on its own task, logging a server failure as soon as it happens.
pub fn spawn_server(
    listener: TcpListener,
    storage: Arc<dyn EventStorage>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match serve(listener, storage, shutdown).await {
            Ok(()) => log::debug!("HTTP server stopped"),
            Err(error) => log::error!("Server closed with error: {error:#}"),
        }
    })
}

async fn create_event(
    State(state): State<AppState>,
    Json(form): Json<EventForm>,
) -> Result<&'static str, ApiError> {
    validate(&form)?;

    state
        .storage
        .create(Event::new(
            form.chat_id,
            form.timestamp,
            form.title,
            form.description,
        ))
        .await;

    Ok("ok")
}

async fn delete_event(
    State(state): State<AppState>,
    Json(form): Json<EventForm>,
) -> Result<&'static str, ApiError> {
    validate(&form)?;

    state
        .storage
        .delete(&form.chat_id, &form.timestamp)
        .await;

    Ok("ok")
}

async fn list_events(State(state): State<AppState>) -> Json<Vec<Event>> {
    let mut events = state.storage.list().await;
    events.sort_by(|a, b| {
        a.fire_at
            .cmp(&b.fire_at)
            .then_with(|| a.recipient.cmp(&b.recipient))
    });
    Json(events)
}

fn validate(form: &EventForm) -> Result<(), ApiError> {
    if form.chat_id.trim().is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "chat_id is required"));
    }
    Ok(())
}
