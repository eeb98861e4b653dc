//! HTTP Handlers

use std::path::PathBuf;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use agent_core::{
    ConversationRecord, ErrorKind, Notification, NotificationLog, Outcome, RecordStore, SessionId,
    ToolSchema,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub model: String,
    pub provider_reachable: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub outcome: &'static str,
    pub messages: Vec<String>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SessionAction {
    pub session_id: String,
    pub applied: bool,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Wire label for a submission outcome
pub const fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Completed => "completed",
        Outcome::TurnLimit => "turn_limit",
        Outcome::Declined => "declined",
        Outcome::Stopped => "stopped",
        Outcome::Failed(_) => "failed",
    }
}

const fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Network => StatusCode::BAD_GATEWAY,
        ErrorKind::Config => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Generic => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Resolve the project root for a request
///
/// A named directory must exist; otherwise the server default applies.
pub fn working_dir(state: &AppState, requested: Option<&str>) -> Result<PathBuf, ApiError> {
    let Some(requested) = requested.filter(|d| !d.trim().is_empty()) else {
        return Ok(state.default_working_dir.clone());
    };
    let path = PathBuf::from(requested);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_working_dir",
            format!("Not a directory: {requested}"),
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.sessions.agent().provider();
    let provider_reachable = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.name().to_string(),
        model: provider.model().to_string(),
        provider_reachable,
    })
}

/// Tool descriptors offered to the model
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.sessions.agent().tools().schemas())
}

/// Non-streaming chat endpoint
///
/// Runs one submission to completion and returns every notification it
/// produced.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "empty_message",
            "Message must not be empty",
        ));
    }
    let working_dir = working_dir(&state, request.working_dir.as_deref())?;
    let session_id = request
        .session_id
        .map_or_else(SessionId::new, SessionId::from_string);

    tracing::info!(session = %session_id, "Chat request");

    let log = NotificationLog::new();
    let outcome = state
        .sessions
        .submit(&session_id, &request.message, working_dir, &log)
        .await;

    if let Outcome::Failed(kind) = outcome {
        let detail = match log.terminal() {
            Some(Notification::Error { detail, .. }) => detail,
            _ => "Submission failed".to_string(),
        };
        tracing::error!(session = %session_id, %kind, "Chat failed: {}", detail);
        return Err(api_error(error_status(kind), &kind.to_string(), detail));
    }

    Ok(Json(ChatResponse {
        session_id: session_id.to_string(),
        outcome: outcome_label(outcome),
        messages: log.texts(),
        notifications: log.entries(),
    }))
}

/// Live session ids
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut ids: Vec<String> = state
        .sessions
        .session_ids()
        .iter()
        .map(ToString::to_string)
        .collect();
    ids.sort();
    Json(ids)
}

/// Displayable transcript of a live session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationRecord>, ApiError> {
    state
        .sessions
        .record(&SessionId::from_string(id.clone()))
        .await
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

/// Stop the in-flight generation of a session
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<SessionAction> {
    let applied = state.sessions.cancel(&SessionId::from_string(id.clone()));
    tracing::info!(session = %id, applied, "Cancel requested");
    Json(SessionAction {
        session_id: id,
        applied,
    })
}

/// Start the session over with empty history
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionAction>, ApiError> {
    if state.sessions.reset(&SessionId::from_string(id.clone())) {
        Ok(Json(SessionAction {
            session_id: id,
            applied: true,
        }))
    } else {
        Err(not_found(&id))
    }
}

/// Drop a session and its saved record
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.sessions.remove(&SessionId::from_string(id.clone()));
    if let Err(e) = state.records.delete(&id) {
        tracing::warn!(session = %id, "Failed to delete record: {}", e);
    }
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

/// Saved conversation records, newest first
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationRecord>>, ApiError> {
    state.records.list(50).map(Json).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "record_store",
            e.to_string(),
        )
    })
}

fn not_found(id: &str) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "unknown_session",
        format!("No session '{id}'"),
    )
}
