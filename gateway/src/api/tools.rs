//! `/v1/tools` and `/v1/mcp/call` — pass-through to the MCP client (§4.C, §4.J).

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Response {
    match state.mcp.list_tools(false).await {
        Ok(tools) => Json(tools).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

pub async fn call(State(state): State<AppState>, Json(body): Json<CallToolRequest>) -> Response {
    let result = state.mcp.call_tool(&body.name, body.arguments).await;
    Json(result).into_response()
}
