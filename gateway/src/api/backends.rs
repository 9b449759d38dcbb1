//! `/api/backends*` — inspect and control the fallback chain (§4.B, §4.J).

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "backends": state.backends.list_backends(),
        "chain": state.backends.get_backends_chain(),
        "circuits": state.backends.get_circuit_states(),
    }))
    .into_response()
}

pub async fn current(State(state): State<AppState>) -> Response {
    match state.backends.get_healthy_backend().await {
        Ok(backend) => Json(serde_json::json!({ "name": backend.name() })).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn invalidate(
    State(state): State<AppState>,
    Json(body): Json<InvalidateRequest>,
) -> Response {
    state.backends.invalidate_health_cache(body.name.as_deref());
    Json(serde_json::json!({ "invalidated": body.name })).into_response()
}
