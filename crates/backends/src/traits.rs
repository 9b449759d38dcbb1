//! The polymorphic backend contract every adapter implements (§4.A).

use agw_domain::error::Result;
use agw_domain::stream::{BoxStream, StreamEvent};
use agw_domain::tool::{Message, ToolDefinition};

/// Per-request backend configuration. Immutable for the duration of a
/// request (§3 "Backend Config").
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
    /// Opaque passthrough parameters (e.g. a backend-specific conversation id).
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Health {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Health {
    pub fn ok() -> Self {
        Self { ok: true, detail: None }
    }
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self { ok: false, detail: Some(detail.into()) }
    }
}

/// Every LLM backend adapter implements this trait (§4.A Contract).
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// If false, tool calls arrive embedded in assistant text as
    /// `<tool_call>...</tool_call>` blocks and must be extracted by the
    /// XML tool parser instead of the backend's native tool-call wire format.
    fn supports_native_tools(&self) -> bool;

    fn default_model(&self) -> &str;

    async fn stream_chat(
        &self,
        messages: &[Message],
        config: &ChatConfig,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    async fn health(&self) -> Health;
}
