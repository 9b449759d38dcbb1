//! AG-UI compatible SSE event vocabulary (§4.I).
//!
//! Every event is one JSON object tagged by `type`; a stream closes with the
//! literal frame `data: [DONE]\n\n`.

use serde::Serialize;
use serde_json::Value;

/// A single frame of the event stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    // ── Lifecycle ──────────────────────────────────────────────
    RunStarted {
        thread_id: String,
        run_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_run_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    RunFinished {
        thread_id: String,
        run_id: String,
        outcome: RunOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        interrupt: Option<Value>,
    },
    RunError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    StepStarted {
        step_name: String,
    },
    StepFinished {
        step_name: String,
    },

    // ── Messages ───────────────────────────────────────────────
    TextMessageStart {
        message_id: String,
        role: String,
    },
    TextMessageContent {
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        message_id: String,
    },

    // ── Tools ──────────────────────────────────────────────────
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },
    ToolCallArgs {
        tool_call_id: String,
        delta: String,
    },
    ToolCallEnd {
        tool_call_id: String,
    },
    ToolCallResult {
        tool_call_id: String,
        content: String,
        role: String,
    },

    // ── State ──────────────────────────────────────────────────
    StateSnapshot {
        snapshot: Value,
    },
    StateDelta {
        delta: Vec<Value>,
    },
    MessagesSnapshot {
        messages: Vec<Value>,
    },

    // ── Custom ─────────────────────────────────────────────────
    Custom {
        name: String,
        value: Value,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Interrupt,
}

/// The terminal SSE frame, sent once after the last [`AgentEvent`].
pub const DONE_FRAME: &str = "[DONE]";

impl AgentEvent {
    /// Render as one SSE `data:` frame, including the trailing blank line.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", serde_json::to_string(self).expect("AgentEvent serializes"))
    }

    /// A `clarification_request` custom event carrying the pending
    /// interrupt's payload (§4.F step 7).
    pub fn clarification_request(payload: Value) -> Self {
        AgentEvent::Custom { name: "clarification_request".into(), value: payload }
    }
}

/// Render the terminal `data: [DONE]\n\n` frame.
pub fn done_frame() -> String {
    format!("data: {DONE_FRAME}\n\n")
}
