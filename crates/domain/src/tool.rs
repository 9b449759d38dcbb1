//! Normalized message, tool schema, tool-call, and tool-result types (§3).
//!
//! Every backend adapter converts to/from these. Internal messages are
//! mutated only by appending during the tool loop and are discarded at
//! request end.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A normalized conversation message (§3 "LLM Message").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Present on `tool`-role messages: the id of the call this responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Present on `assistant`-role messages that invoked tools this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            name: None,
            tool_call_id: None,
            tool_calls,
        }
    }
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// A single tool invocation requested by the model (§3 "Tool Call").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Always a parsed JSON object, never a string.
    pub arguments: Value,
    /// Which provider produced this call (e.g. "anthropic", "openai", "xml").
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Error detail attached to a failed tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorDetail {
    pub code: i64,
    pub message: String,
}

/// The outcome of a single tool invocation (§3 "Tool Result").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorDetail>,
}

impl ToolResult {
    pub fn ok(id: impl Into<String>, name: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ok: true,
            content,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, name: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ok: false,
            content: Value::Null,
            error: Some(ToolErrorDetail {
                code,
                message: message.into(),
            }),
        }
    }

    /// A single string rendering of the result, suitable for a tool-role
    /// message's content field.
    pub fn render_content(&self) -> String {
        if self.ok {
            match &self.content {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        } else {
            self.error
                .as_ref()
                .map(|e| format!("error {}: {}", e.code, e.message))
                .unwrap_or_else(|| "unknown tool error".to_string())
        }
    }

    /// True when the result is a structured payload carrying `pending: true`
    /// — the human-in-the-loop interrupt interception (§4.F step 7).
    pub fn pending_interrupt(&self) -> Option<&serde_json::Map<String, Value>> {
        if !self.ok {
            return None;
        }
        let obj = self.content.as_object()?;
        if obj.get("pending").and_then(Value::as_bool) == Some(true) {
            Some(obj)
        } else {
            None
        }
    }
}

/// Tool schema exposed to the model (§3 "Tool Schema").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema-like object.
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Anthropic-style `{name, description, input_schema}` block.
    pub fn to_anthropic(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }

    /// OpenAI-style `{type:"function", function:{...}}` block.
    pub fn to_openai(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_anthropic_shape() {
        let def = ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        let v = def.to_anthropic();
        assert_eq!(v["name"], "list_files");
        assert_eq!(v["input_schema"]["type"], "object");
    }

    #[test]
    fn tool_definition_openai_shape() {
        let def = ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        let v = def.to_openai();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "list_files");
    }

    #[test]
    fn tool_result_render_content_ok() {
        let r = ToolResult::ok("1", "x", Value::String("hello".into()));
        assert_eq!(r.render_content(), "hello");
    }

    #[test]
    fn tool_result_render_content_error() {
        let r = ToolResult::failed("1", "x", -1, "cannot connect");
        assert_eq!(r.render_content(), "error -1: cannot connect");
    }

    #[test]
    fn pending_interrupt_detection() {
        let r = ToolResult::ok(
            "1",
            "ask_user",
            serde_json::json!({"pending": true, "prompt_id": "q1"}),
        );
        assert!(r.pending_interrupt().is_some());

        let r2 = ToolResult::ok("1", "x", serde_json::json!({"pending": false}));
        assert!(r2.pending_interrupt().is_none());
    }
}
