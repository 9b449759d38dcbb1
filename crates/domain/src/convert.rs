//! Total conversions between the internal [`Message`] list and each
//! backend's wire shape (§4.D).
//!
//! These are pure functions: round-tripping the non-tool assistant/user
//! path is lossless aside from whitespace normalization.

use crate::tool::{Message, Role, ToolCall};
use serde_json::{json, Value};

/// Anthropic-shape conversion result: a joined system string plus a
/// `{role, content:[...blocks]}` message array.
pub struct AnthropicMessages {
    pub system: Option<String>,
    pub messages: Vec<Value>,
}

/// Convert internal messages to Anthropic's content-block shape.
///
/// System messages are collected and joined into a single string returned
/// alongside the message list. Tool-role messages become a `user` message
/// with a single `tool_result` block. Assistant messages that invoked tools
/// become content arrays mixing `text` and `tool_use` blocks.
pub fn to_anthropic(messages: &[Message]) -> AnthropicMessages {
    let mut system_parts = Vec::new();
    let mut out = Vec::new();

    for m in messages {
        match m.role {
            Role::System => system_parts.push(m.content.clone()),
            Role::User => {
                out.push(json!({
                    "role": "user",
                    "content": [{"type": "text", "text": m.content}],
                }));
            }
            Role::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": m.content}));
                }
                for call in &m.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                out.push(json!({"role": "assistant", "content": blocks}));
            }
            Role::Tool => {
                let tool_use_id = m.tool_call_id.clone().unwrap_or_default();
                out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": m.content,
                    }],
                }));
            }
        }
    }

    AnthropicMessages {
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        },
        messages: out,
    }
}

/// Convert internal messages to OpenAI's chat-completions shape.
///
/// Direct per-role mapping. Assistant messages with tool calls carry a
/// `tool_calls` array whose arguments are JSON-encoded strings.
pub fn to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| match m.role {
            Role::System => json!({"role": "system", "content": m.content}),
            Role::User => json!({"role": "user", "content": m.content}),
            Role::Assistant => {
                if m.tool_calls.is_empty() {
                    json!({"role": "assistant", "content": m.content})
                } else {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|c: &ToolCall| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": c.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    json!({
                        "role": "assistant",
                        "content": if m.content.is_empty() { Value::Null } else { Value::String(m.content.clone()) },
                        "tool_calls": calls,
                    })
                }
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id,
                "content": m.content,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_collects_system_messages() {
        let msgs = vec![
            Message::system("be helpful"),
            Message::system("be brief"),
            Message::user("hi"),
        ];
        let result = to_anthropic(&msgs);
        assert_eq!(result.system.as_deref(), Some("be helpful\nbe brief"));
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn anthropic_user_assistant_roundtrip_is_lossless() {
        let msgs = vec![Message::user("hello"), Message::assistant("hi there")];
        let result = to_anthropic(&msgs);
        assert_eq!(result.messages[0]["content"][0]["text"], "hello");
        assert_eq!(result.messages[1]["content"][0]["text"], "hi there");
    }

    #[test]
    fn anthropic_tool_result_becomes_user_message() {
        let msgs = vec![Message::tool_result("call_1", "42")];
        let result = to_anthropic(&msgs);
        assert_eq!(result.messages[0]["role"], "user");
        assert_eq!(result.messages[0]["content"][0]["type"], "tool_result");
        assert_eq!(result.messages[0]["content"][0]["tool_use_id"], "call_1");
    }

    #[test]
    fn openai_tool_calls_are_json_encoded_strings() {
        let call = ToolCall {
            id: "c1".into(),
            name: "list_files".into(),
            arguments: json!({"path": "."}),
            provider: "openai".into(),
            raw: None,
        };
        let msgs = vec![Message::assistant_with_tool_calls("", vec![call])];
        let result = to_openai(&msgs);
        let arguments = result[0]["tool_calls"][0]["function"]["arguments"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(arguments).unwrap();
        assert_eq!(parsed["path"], ".");
    }

    #[test]
    fn openai_plain_roundtrip() {
        let msgs = vec![Message::system("sys"), Message::user("hi"), Message::assistant("yo")];
        let result = to_openai(&msgs);
        assert_eq!(result[0]["role"], "system");
        assert_eq!(result[1]["content"], "hi");
        assert_eq!(result[2]["content"], "yo");
    }
}
