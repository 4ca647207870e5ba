//! JSON API for controlling Hugo, plus the live log stream.

use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::hugo_status::HugoStatus;
use crate::log_buffer::{LogEntry, SubscriptionId};
use crate::supervisor::HugoManager;
use crate::web::helpers::ApiError;
use crate::web::server::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: HugoStatus,
    pub message: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (status, message) = state.manager.status();
    Json(StatusResponse {
        status,
        message,
        port: state.manager.port(),
    })
}

pub async fn start(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.manager.start().await?;
    Ok(Json(ActionResponse { status: "starting" }))
}

pub async fn stop(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.manager.stop().await?;
    Ok(Json(ActionResponse { status: "stopped" }))
}

pub async fn restart(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    state.manager.restart().await?;
    Ok(Json(ActionResponse {
        status: "restarting",
    }))
}

pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    let limit = match query.limit {
        None => state.log_lines,
        Some(n) if n <= 0 => 0,
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
    };
    Json(state.manager.logs(limit))
}

/// Recent backlog first, then every new entry as it arrives. Ends when the
/// manager closes its subscribers.
pub async fn stream_sse(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let manager = state.manager;
    // subscribe before taking the backlog so nothing falls between the two
    let mut subscription = manager.subscribe();
    let backlog = manager.logs(state.log_lines);
    let guard = Unsubscribe {
        id: subscription.id(),
        manager,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        for entry in &backlog {
            yield Ok(log_event(entry));
        }
        while let Some(entry) = subscription.recv().await {
            yield Ok(log_event(&entry));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn log_event(entry: &LogEntry) -> Event {
    Event::default()
        .event("log")
        .json_data(entry)
        .unwrap_or_else(|err| Event::default().event("error").data(err.to_string()))
}

/// Releases a live viewer's subscription when its connection goes away.
struct Unsubscribe {
    id: SubscriptionId,
    manager: Arc<HugoManager>,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.manager.unsubscribe(self.id);
    }
}
