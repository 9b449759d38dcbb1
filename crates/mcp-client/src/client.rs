//! The MCP client proper: lazy handshake, TTL-cached tool discovery, tool
//! invocation, and health probing (§4.C).

use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{HttpTransport, TransportError};
use agw_domain::config::McpConfig;
use agw_domain::error::{Error, Result};
use agw_domain::tool::{ToolDefinition, ToolResult};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Fixed per §4.C regardless of `list_tools_ttl_secs` (which only governs
/// how long a successful list is cached, not how long we wait for one).
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of [`McpClient::health_check`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct McpHealth {
    pub ok: bool,
    pub url: String,
    pub detail: Option<String>,
}

struct ToolListCache {
    fetched_at: Instant,
    tools: Vec<ToolDefinition>,
}

/// Client for a single MCP tool server reached over JSON-RPC 2.0 via HTTP.
///
/// The `initialize` handshake runs lazily on first use and is shared across
/// callers (a process-wide session), guarded by `initialized`.
pub struct McpClient {
    transport: HttpTransport,
    base_url: String,
    call_timeout: Duration,
    health_timeout: Duration,
    list_ttl: Duration,
    initialized: Mutex<bool>,
    list_cache: RwLock<Option<ToolListCache>>,
}

impl McpClient {
    pub fn new(config: &McpConfig) -> Self {
        Self {
            transport: HttpTransport::new(&config.base_url),
            base_url: config.base_url.clone(),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
            list_ttl: Duration::from_secs(config.list_tools_ttl_secs),
            initialized: Mutex::new(false),
            list_cache: RwLock::new(None),
        }
    }

    async fn ensure_initialized(&self) -> Result<()> {
        let mut done = self.initialized.lock().await;
        if *done {
            return Ok(());
        }

        let params = serde_json::to_value(protocol::initialize_params()).map_err(Error::Json)?;
        let resp = self
            .transport
            .send_request("initialize", Some(params), HANDSHAKE_TIMEOUT)
            .await
            .map_err(to_domain_error)?;
        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(Error::Other(format!("MCP initialize failed: {err}")));
        }

        self.transport
            .send_notification("notifications/initialized", HANDSHAKE_TIMEOUT)
            .await
            .map_err(to_domain_error)?;

        *done = true;
        tracing::debug!(base_url = %self.base_url, "MCP handshake complete");
        Ok(())
    }

    /// Discover tools, reusing a cached list younger than the configured TTL
    /// unless `force_refresh` is set.
    pub async fn list_tools(&self, force_refresh: bool) -> Result<Vec<ToolDefinition>> {
        if !force_refresh {
            if let Some(cache) = self.list_cache.read().await.as_ref() {
                if cache.fetched_at.elapsed() < self.list_ttl {
                    return Ok(cache.tools.clone());
                }
            }
        }

        self.ensure_initialized().await?;

        let resp = self
            .transport
            .send_request("tools/list", None, HANDSHAKE_TIMEOUT)
            .await
            .map_err(to_domain_error)?;
        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(Error::Other(format!("MCP tools/list failed: {err}")));
        }

        let result: ToolsListResult = serde_json::from_value(resp.result.unwrap_or(Value::Null)).map_err(Error::Json)?;
        let tools: Vec<ToolDefinition> = result.tools.into_iter().map(mcp_tool_def_to_definition).collect();

        *self.list_cache.write().await = Some(ToolListCache { fetched_at: Instant::now(), tools: tools.clone() });
        Ok(tools)
    }

    /// Invoke a tool. The returned [`ToolResult`] always carries an empty
    /// `id` — the caller fills it in with the originating tool call's id.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        if let Err(e) = self.ensure_initialized().await {
            return ToolResult::failed("", name, -1, format!("cannot connect to MCP server: {e}"));
        }

        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let resp = match self.transport.send_request("tools/call", Some(params), self.call_timeout).await {
            Ok(resp) => resp,
            Err(e) => return transport_error_to_tool_result(name, e),
        };

        if resp.is_error() {
            let err = resp.error.unwrap();
            return ToolResult::failed("", name, err.code, err.message);
        }

        match serde_json::from_value::<ToolCallResult>(resp.result.unwrap_or(Value::Null)) {
            Ok(result) if result.is_error => ToolResult::failed("", name, 1, result.rendered_text()),
            Ok(result) => ToolResult::ok("", name, Value::String(result.rendered_text())),
            Err(e) => ToolResult::failed("", name, -1, format!("malformed tools/call result: {e}")),
        }
    }

    pub async fn health_check(&self) -> McpHealth {
        let params = None;
        let send = self.transport.send_request("tools/list", params, self.health_timeout);
        match send.await {
            Ok(resp) if !resp.is_error() => McpHealth { ok: true, url: self.base_url.clone(), detail: None },
            Ok(resp) => {
                let err = resp.error.unwrap();
                McpHealth { ok: false, url: self.base_url.clone(), detail: Some(err.to_string()) }
            }
            Err(e) => McpHealth { ok: false, url: self.base_url.clone(), detail: Some(e.to_string()) },
        }
    }
}

fn mcp_tool_def_to_definition(def: McpToolDef) -> ToolDefinition {
    ToolDefinition { name: def.name, description: def.description, input_schema: def.input_schema }
}

fn to_domain_error(e: TransportError) -> Error {
    match e {
        TransportError::Connect(msg) => Error::Http(format!("cannot connect to MCP server: {msg}")),
        TransportError::Http { status, body } => Error::Http(format!("MCP server HTTP {status}: {body}")),
        TransportError::Timeout => Error::Timeout("MCP request timed out".into()),
        TransportError::Json(e) => Error::Json(e),
    }
}

fn transport_error_to_tool_result(name: &str, e: TransportError) -> ToolResult {
    match e {
        TransportError::Connect(msg) => ToolResult::failed("", name, -1, format!("cannot connect to MCP server: {msg}")),
        TransportError::Http { status, body } => ToolResult::failed("", name, status as i64, body),
        TransportError::Timeout => ToolResult::failed("", name, -1, "MCP call timed out"),
        TransportError::Json(e) => ToolResult::failed("", name, -1, format!("malformed MCP response: {e}")),
    }
}
