//! # Chat Handlers
//!
//! One conversational turn per request, and thread reset.

use super::{AppError, AppState};
use crate::types::{ChatRequest, ResetRequest, ResetResponse};
use axum::{extract::State, Json};
use memento::TurnResponse;
use tracing::info;
use uuid::Uuid;

/// Runs one turn on the request's thread, opening a new thread when none is given.
///
/// Turns of one thread are serialized on the session lock; distinct threads run
/// concurrently.
pub async fn chat_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest(
            "The 'message' field must not be empty.".to_string(),
        ));
    }
    let thread_id = payload
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(thread_id = %thread_id, "Received chat message: '{message}'");

    let handle = app_state.sessions.get_or_create(&thread_id).await;
    let cancel = handle.cancellation();
    let mut session = handle.session.lock().await;
    let turn = app_state
        .controller
        .handle_turn(&mut session, message, cancel)
        .await?;
    let response = app_state.renderer.render(&thread_id, turn).await;

    Ok(Json(response))
}

/// Forgets a thread and cancels its in-flight execution, if any.
pub async fn reset_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, AppError> {
    if payload.thread_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "The 'thread_id' field must not be empty.".to_string(),
        ));
    }
    let reset = app_state.sessions.reset(&payload.thread_id).await;
    info!(thread_id = %payload.thread_id, reset, "Reset requested");
    Ok(Json(ResetResponse {
        thread_id: payload.thread_id,
        reset,
    }))
}
