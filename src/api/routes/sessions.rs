//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Joining a meeting (POST /sessions/:id/join)
//! - Leaving a meeting (POST /sessions/:id/leave)
//! - Getting one session (GET /sessions/:id)
//! - Listing live sessions (GET /sessions)
//! - Transport disconnect webhook (POST /transport/disconnect)

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::session::{SessionService, SessionSnapshot};

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionsState {
    pub service: Arc<SessionService>,
}

/// Request body for the join endpoint.
#[derive(Debug, Default, serde::Deserialize)]
pub struct JoinRequest {
    /// Display name for the meeting; defaults to the meeting id.
    pub name: Option<String>,
}

/// Body of the disconnect webhook the media transport pushes.
#[derive(Debug, serde::Deserialize)]
pub struct DisconnectNotice {
    pub meeting_id: String,
}

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/join", post(join_session))
        .route("/sessions/:id/leave", post(leave_session))
        .route("/transport/disconnect", post(transport_disconnect))
        .with_state(state)
}

fn snapshot_json(snapshot: &SessionSnapshot) -> Value {
    json!({
        "meeting_id": snapshot.meeting_id,
        "meeting_name": snapshot.meeting_name,
        "phase": snapshot.phase.as_str(),
        "dispatch_status": snapshot.dispatch_status.as_str(),
        "created_at": snapshot.created_at,
        "ended_at": snapshot.ended_at,
        "last_error": snapshot.last_error,
    })
}

async fn join_session(
    Path(id): Path<String>,
    State(state): State<SessionsState>,
    body: Option<Json<JoinRequest>>,
) -> ApiResult<Json<Value>> {
    let name = body
        .and_then(|Json(req)| req.name)
        .unwrap_or_else(|| id.clone());

    info!("Join requested for meeting {} via API", id);
    let phase = state.service.join(&id, &name).await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": id,
        "phase": phase.as_str(),
        "message": "Joined meeting",
    })))
}

async fn leave_session(
    Path(id): Path<String>,
    State(state): State<SessionsState>,
) -> ApiResult<Json<Value>> {
    info!("Leave requested for meeting {} via API", id);
    let phase = state.service.leave(&id).await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": id,
        "phase": phase.as_str(),
        "message": "Left meeting",
    })))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<SessionsState>,
) -> ApiResult<Json<Value>> {
    match state.service.snapshot(&id).await {
        Some(snapshot) => Ok(Json(snapshot_json(&snapshot))),
        None => Err(ApiError::not_found(format!("no session for meeting {}", id))),
    }
}

async fn list_sessions(State(state): State<SessionsState>) -> Json<Value> {
    let sessions: Vec<Value> = state
        .service
        .list()
        .await
        .iter()
        .map(snapshot_json)
        .collect();

    Json(json!({ "sessions": sessions }))
}

async fn transport_disconnect(
    State(state): State<SessionsState>,
    Json(notice): Json<DisconnectNotice>,
) -> ApiResult<Json<Value>> {
    info!(
        "Transport disconnect notification for meeting {}",
        notice.meeting_id
    );
    let phase = state.service.transport_disconnect(&notice.meeting_id).await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": notice.meeting_id,
        "phase": phase.as_str(),
    })))
}
