//! HTTP request handlers

use super::sse::frame_stream;
use super::types::{ChatRequest, ErrorResponse};
use super::AppState;
use crate::llm::RelayErrorKind;
use crate::settings::apply_update;
use crate::sink::{ready_status, ChannelSink};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Relay one conversation, frames streamed back as SSE
        .route("/chat", post(request_chat))
        // Readiness frame on connect
        .route("/ready", get(ready))
        // Configuration page submissions
        .route("/settings", post(update_settings))
        .with_state(state)
}

async fn request_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let Some(encoded) = req.request_chat.filter(|encoded| !encoded.is_empty()) else {
        return Err(AppError::BadRequest("REQUEST_CHAT is required".to_string()));
    };

    let permit = state.runtime.try_begin().map_err(|e| match e.kind {
        RelayErrorKind::Busy => AppError::Conflict(e.to_string()),
        _ => AppError::Internal(e.to_string()),
    })?;

    let (tx, rx) = mpsc::unbounded_channel();
    let sink = ChannelSink::new(tx);
    let runtime = Arc::clone(&state.runtime);
    tokio::spawn(async move {
        runtime.run(permit, &encoded, &sink).await;
    });

    Ok(frame_stream(rx).into_response())
}

async fn ready(State(state): State<AppState>) -> Json<Value> {
    Json(ready_status(state.runtime.store().as_ref()).to_frame())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(form): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let store = state.runtime.store();
    let written =
        apply_update(store.as_ref(), &form).map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(written, "Settings updated");

    Ok(Json(ready_status(store.as_ref()).to_frame()))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
