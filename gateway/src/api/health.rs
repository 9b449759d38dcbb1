//! `GET /healthz` — liveness probe.

use axum::response::{IntoResponse, Json, Response};

pub async fn healthz() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
