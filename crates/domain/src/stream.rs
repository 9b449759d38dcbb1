//! Backend-level stream events (§3 "Stream Event", §4.A stream contract).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// A boxed async stream of backend-level events.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Events produced by a backend while streaming a single chat turn.
/// Must be emitted in arrival order; `Done` is terminal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "delta")]
    Delta { text: String },

    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },

    #[serde(rename = "done")]
    Done {
        stop_reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },

    #[serde(rename = "error")]
    Error { message: String, code: Option<String> },
}
