//! `/v1/agents/*` — thin REST wrappers over the agent registry (§4.G, §4.J).

use agw_domain::agent::{AgentRole, AgentStatus};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub model_name: String,
    #[serde(default)]
    pub role: Option<AgentRole>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub pty_session_id: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    match state.registry.register(
        &body.model_name,
        body.role,
        body.capabilities,
        body.agent_id,
        body.pty_session_id,
    ) {
        Ok((agent, message)) => {
            Json(serde_json::json!({ "agent": agent, "message": message })).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub current_task_id: Option<String>,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatRequest>,
) -> Response {
    match state
        .registry
        .heartbeat(&body.agent_id, body.status, body.current_task_id)
    {
        Ok(agent) => Json(agent).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_dead: bool,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    Json(state.registry.list_all(query.include_dead)).into_response()
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id) {
        Some(agent) => Json(agent).into_response(),
        None => ApiError(agw_domain::error::Error::UnknownAgent(id)).into_response(),
    }
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.deregister(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn leader(State(state): State<AppState>) -> Response {
    match state.registry.get_leader() {
        Ok(agent) => Json(agent).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    Json(state.registry.stats()).into_response()
}

pub async fn purge_dead(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({ "purged": state.registry.purge_dead() })).into_response()
}

pub async fn purge_all(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({ "purged": state.registry.purge_all() })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SetTimeoutRequest {
    pub heartbeat_timeout_ms: i64,
}

pub async fn set_timeout(
    State(state): State<AppState>,
    Json(body): Json<SetTimeoutRequest>,
) -> Response {
    state
        .registry
        .set_heartbeat_timeout_ms(body.heartbeat_timeout_ms);
    StatusCode::OK.into_response()
}
