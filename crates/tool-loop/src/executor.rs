//! The tool-execution seam the driver calls into (§4.F step 7).

use agw_domain::tool::ToolResult;
use agw_mcp_client::McpClient;
use serde_json::Value;

/// Abstracts over "however tools actually get invoked" so the driver never
/// depends on MCP directly. Production wiring uses [`McpClient`]; tests use
/// fakes.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn call(&self, name: &str, arguments: Value) -> ToolResult;
}

#[async_trait::async_trait]
impl ToolExecutor for McpClient {
    async fn call(&self, name: &str, arguments: Value) -> ToolResult {
        self.call_tool(name, arguments).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted executor: returns `responses[call_index]`, cycling the last
    /// entry if called more times than scripted.
    pub struct ScriptedExecutor {
        responses: Vec<ToolResult>,
        calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        pub fn new(responses: Vec<ToolResult>) -> Self {
            Self { responses, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl ToolExecutor for ScriptedExecutor {
        async fn call(&self, _name: &str, _arguments: Value) -> ToolResult {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = i.min(self.responses.len() - 1);
            self.responses[idx].clone()
        }
    }
}
