//! API routes
//!
//! The local surface a chat window drives: send a message, read the
//! conversation, follow new turns as they arrive.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::capture::CaptureError;
use crate::config::prompts::Snippet;
use crate::config::PromptSettings;
use crate::conversation::Turn;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    capture: bool,
    recorder: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct TurnsResponse {
    pub busy: bool,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub output: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        capture: state.session.capture_available(),
        recorder: state.session.recorder_available(),
    })
}

async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    // The turn runs detached; progress is visible through /v1/turns and /v1/events
    match state.session.submit(&request.text) {
        Some(_) => (StatusCode::ACCEPTED, Json(SubmitResponse { queued: true })),
        None => (StatusCode::OK, Json(SubmitResponse { queued: false })),
    }
}

async fn turns(State(state): State<AppState>) -> Json<TurnsResponse> {
    Json(TurnsResponse {
        busy: state.session.is_busy(),
        turns: state.session.turns().await,
    })
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.session.subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(turn) => match Event::default().event("turn").json_data(&turn) {
                    Ok(event) => yield Ok(event),
                    Err(e) => tracing::warn!("Failed to encode turn event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event subscriber lagged by {} turns", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn prompts(State(state): State<AppState>) -> Json<PromptSettings> {
    Json(state.session.prompts().clone())
}

async fn snippet(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Snippet>, StatusCode> {
    state
        .session
        .prompts()
        .snippet(&name)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn recorder_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    match state.session.search_recorder(&params.query).await {
        Ok(output) => Ok(Json(SearchResponse { output })),
        Err(e @ CaptureError::NotInstalled(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/messages", post(submit))
        .route("/v1/turns", get(turns))
        .route("/v1/events", get(events))
        .route("/v1/prompts", get(prompts))
        .route("/v1/prompts/:name", get(snippet))
        .route("/v1/recorder/search", get(recorder_search))
}
