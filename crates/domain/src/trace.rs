//! Structured trace events emitted across the gateway crates.
//!
//! Each variant maps to one `tracing::info!` line carrying a JSON payload,
//! so log aggregation can filter on `event` without parsing free text.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BackendSelected {
        backend: String,
        chain_position: usize,
    },
    BackendFallback {
        from_backend: String,
        to_backend: String,
        reason: String,
    },
    CircuitOpened {
        backend: String,
        consecutive_failures: u32,
        open_for_secs: u64,
    },
    CircuitClosed {
        backend: String,
    },
    ToolCallDispatched {
        tool: String,
        call_id: String,
    },
    ToolCallCompleted {
        tool: String,
        call_id: String,
        ok: bool,
        duration_ms: u64,
    },
    LeaderPromoted {
        agent_id: String,
    },
    AgentReaped {
        agent_id: String,
        was_leader: bool,
    },
    InterruptCreated {
        thread_id: String,
        interrupt_id: String,
    },
    InterruptResolved {
        thread_id: String,
        interrupt_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agw_event");
    }
}
