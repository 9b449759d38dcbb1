//! `/v2/chat/*` — the streaming tool-loop endpoint and its interrupt
//! companions (§4.J).

use std::sync::OnceLock;

use agw_backends::traits::ChatConfig;
use agw_domain::error::Error;
use agw_domain::tool::{Message, ToolDefinition};
use agw_loop::ToolLoop;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::{Stream, StreamExt};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{api_error, ApiError};
use crate::state::AppState;

fn run_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{8}_[0-9]{6}_[0-9a-f]{8}$").unwrap())
}

fn generate_run_id() -> String {
    let now = chrono::Utc::now();
    let hex: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), hex)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentRoleHeader {
    Leader,
    Worker,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub extra: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamQuery {
    #[serde(default)]
    pub direct: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v2/chat/stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<ChatStreamQuery>,
    Json(body): Json<ChatStreamRequest>,
) -> Response {
    let role = match header_str(&headers, "x-agent-role").unwrap_or("leader") {
        "leader" => AgentRoleHeader::Leader,
        "worker" => AgentRoleHeader::Worker,
        other => {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("X-Agent-Role must be \"leader\" or \"worker\", got \"{other}\""),
            )
        }
    };
    let worker_id = header_str(&headers, "x-worker-id").map(str::to_string);
    let requested_run_id = header_str(&headers, "x-agent-run-id").map(str::to_string);

    let mut body = body;
    let run_id = match role {
        AgentRoleHeader::Worker => {
            let Some(run_id) = requested_run_id else {
                return ApiError(Error::InvalidRunId("missing X-Agent-Run-Id header".into()))
                    .into_response();
            };
            if !run_id_re().is_match(&run_id) {
                return ApiError(Error::InvalidRunId(run_id)).into_response();
            }
            let Some(pack) = state.context_packs.get(&run_id) else {
                return ApiError(Error::MissingContextPack(run_id)).into_response();
            };
            if body.model.is_none() {
                body.model = pack
                    .get("model")
                    .and_then(|m| m.as_str())
                    .map(str::to_string);
            }
            run_id
        }
        AgentRoleHeader::Leader => {
            let run_id = match requested_run_id {
                Some(id) if run_id_re().is_match(&id) => id,
                Some(bad) => return ApiError(Error::InvalidRunId(bad)).into_response(),
                None => generate_run_id(),
            };
            state.context_packs.put(
                &run_id,
                serde_json::json!({ "messages": body.messages, "model": body.model }),
            );
            run_id
        }
    };

    let thread_id = body.thread_id.clone().unwrap_or_else(|| run_id.clone());

    let backend = if let Some(name) = &body.backend {
        match state.backends.get_backend(name) {
            Ok(b) => b,
            Err(e) => return ApiError(e).into_response(),
        }
    } else {
        match state.backends.get_healthy_backend().await {
            Ok(b) => b,
            Err(e) => return ApiError(e).into_response(),
        }
    };

    if query.direct {
        let config = ChatConfig {
            model: body.model.clone(),
            temperature: body.temperature,
            max_tokens: body.max_tokens,
            tools: body.tools.clone().unwrap_or_default(),
            extra: body.extra.clone().unwrap_or(Value::Null),
        };
        let inner = match backend.stream_chat(&body.messages, &config).await {
            Ok(s) => s,
            Err(e) => return ApiError(e).into_response(),
        };
        return Sse::new(direct_sse_stream(inner))
            .keep_alive(KeepAlive::default())
            .into_response();
    }

    let tools = match body.tools {
        Some(tools) if !tools.is_empty() => tools,
        _ => state.mcp.list_tools(false).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "MCP tool discovery failed, running with no tools");
            Vec::new()
        }),
    };

    let max_tool_calls = state.tool_limits.resolve(
        None,
        worker_id.as_deref(),
        state.config.limits.default_max_tool_calls,
    );

    let executor: std::sync::Arc<dyn agw_loop::ToolExecutor> = state.mcp.clone();
    let tool_loop = ToolLoop::new(
        backend,
        executor,
        tools,
        max_tool_calls,
        worker_id,
        body.model.clone(),
        body.extra.clone().unwrap_or(Value::Null),
    );

    let events = tool_loop.run(
        thread_id,
        run_id,
        body.messages,
        body.temperature,
        body.max_tokens,
    );
    Sse::new(agent_event_sse_stream(events))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn direct_sse_stream(
    mut inner: agw_domain::stream::BoxStream<
        'static,
        agw_domain::error::Result<agw_domain::stream::StreamEvent>,
    >,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = inner.next().await {
            match event {
                Ok(ev) => yield Ok(Event::default().data(serde_json::to_string(&ev).unwrap_or_default())),
                Err(e) => yield Ok(Event::default().event("error").data(serde_json::json!({"message": e.to_string()}).to_string())),
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

fn agent_event_sse_stream(
    mut events: agw_domain::stream::BoxStream<'static, agw_events::AgentEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(ev) = events.next().await {
            yield Ok(Event::default().data(serde_json::to_string(&ev).unwrap_or_default()));
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v2/chat/clarify
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    pub thread_id: String,
    pub interrupt_id: String,
    pub answer: String,
    #[serde(default)]
    pub modifications: Option<Value>,
}

pub async fn clarify(State(state): State<AppState>, Json(body): Json<ClarifyRequest>) -> Response {
    match state.interrupts.resolve_interrupt(
        &body.thread_id,
        &body.interrupt_id,
        body.answer,
        body.modifications,
    ) {
        Ok(Some(resume)) => Json(resume).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "interrupt not found"),
        Err(e) => ApiError(e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v2/chat/interrupts/{thread_id}
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn pending_interrupts(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Response {
    Json(state.interrupts.get_pending(&thread_id)).into_response()
}
