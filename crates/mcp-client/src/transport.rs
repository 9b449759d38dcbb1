//! HTTP transport for the MCP client (§4.C: "JSON-RPC 2.0 over HTTP to an
//! external tool server").
//!
//! Unlike a stdio transport, each JSON-RPC request is its own HTTP POST —
//! there is no persistent process or connection to keep alive, so requests
//! are naturally independent and don't need a response-matching loop.

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect to MCP server: {0}")]
    Connect(String),

    #[error("MCP server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("timed out waiting for MCP server")]
    Timeout,

    #[error("malformed MCP response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Truncate an HTTP error body so it doesn't blow up a tool-result payload.
const MAX_ERROR_BODY: usize = 500;

/// Sends one JSON-RPC request per HTTP POST to a fixed base URL.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn send_request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<JsonRpcResponse, TransportError> {
        let id = self.next_request_id();
        let req = JsonRpcRequest::new(id, method, params);

        let send = self.client.post(&self.base_url).json(&req).send();
        let resp = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| TransportError::Connect(e.to_string()))?;
        if !status.is_success() {
            let truncated: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(TransportError::Http { status: status.as_u16(), body: truncated });
        }

        Ok(serde_json::from_str(&body)?)
    }

    pub async fn send_notification(&self, method: &str, timeout: Duration) -> Result<(), TransportError> {
        let notif = JsonRpcNotification::new(method);
        let send = self.client.post(&self.base_url).json(&notif).send();
        tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(())
    }
}
