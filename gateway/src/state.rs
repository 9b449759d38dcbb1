use std::collections::HashMap;
use std::sync::Arc;

use agw_backends::BackendRegistry;
use agw_domain::config::Config;
use agw_interrupts::InterruptStore;
use agw_loop::WorkerToolLimits;
use agw_mcp_client::McpClient;
use agw_registry::AgentRegistry;
use parking_lot::RwLock;
use serde_json::Value;

/// In-memory store of per-run context payloads a worker needs to continue
/// a leader-initiated run (§4.J "Worker run id that exists but lacks a
/// persisted context payload → 404"). The exact schema is left to the
/// leader request body; the gateway only tracks presence/absence.
#[derive(Default)]
pub struct ContextPackStore {
    packs: RwLock<HashMap<String, Value>>,
}

impl ContextPackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, run_id: &str, pack: Value) {
        self.packs.write().insert(run_id.to_string(), pack);
    }

    pub fn get(&self, run_id: &str) -> Option<Value> {
        self.packs.read().get(run_id).cloned()
    }
}

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backends: Arc<BackendRegistry>,
    pub mcp: Arc<McpClient>,
    pub registry: Arc<AgentRegistry>,
    pub interrupts: Arc<InterruptStore>,
    pub tool_limits: Arc<WorkerToolLimits>,
    pub context_packs: Arc<ContextPackStore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_run_id_has_no_pack() {
        let store = ContextPackStore::new();
        assert!(store.get("20260731_120000_deadbeef").is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = ContextPackStore::new();
        let pack = serde_json::json!({ "model": "claude-3" });
        store.put("20260731_120000_deadbeef", pack.clone());
        assert_eq!(store.get("20260731_120000_deadbeef"), Some(pack));
    }
}
