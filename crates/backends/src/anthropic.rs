//! Anthropic-style adapter (§4.A "Variants").
//!
//! Supports native tools; the system prompt is passed as a separate
//! top-level parameter; assistant tool calls are encoded as `tool_use`
//! content blocks, tool results as `tool_result` blocks inside a synthetic
//! user message (handled by [`agw_domain::convert::to_anthropic`]).

use crate::sse::sse_response_stream;
use crate::traits::{Backend, ChatConfig, Health};
use agw_domain::convert::to_anthropic;
use agw_domain::error::{Error, Result};
use agw_domain::stream::{BoxStream, StreamEvent, Usage};
use agw_domain::tool::Message;
use serde_json::Value;
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    name: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, messages: &[Message], config: &ChatConfig, stream: bool) -> Value {
        let model = config.model.clone().unwrap_or_else(|| self.default_model.clone());
        let converted = to_anthropic(messages);

        let mut body = serde_json::json!({
            "model": model,
            "messages": converted.messages,
            "stream": stream,
            "max_tokens": config.max_tokens.unwrap_or(4096),
        });
        if let Some(system) = converted.system {
            body["system"] = Value::String(system);
        }
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if !config.tools.is_empty() {
            let tools: Vec<Value> = config.tools.iter().map(|t| t.to_anthropic()).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

struct StreamState {
    active_tool_calls: HashMap<u64, (String, String, String)>,
    usage: Option<Usage>,
    done_emitted: bool,
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("input_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("output_tokens").and_then(|x| x.as_u64()).unwrap_or(0) as u32,
        total_tokens: 0,
    })
}

fn parse_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };
    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let mut events = Vec::new();

    match event_type {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_usage);
            }
        }
        "content_block_start" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    let id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    state.active_tool_calls.insert(idx, (id, name, String::new()));
                }
            }
        }
        "content_block_delta" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                events.push(Ok(StreamEvent::Delta { text: text.to_string() }));
                            }
                        }
                    }
                    "input_json_delta" => {
                        if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                            if let Some(tc) = state.active_tool_calls.get_mut(&idx) {
                                tc.2.push_str(partial);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "content_block_stop" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some((id, name, args)) = state.active_tool_calls.remove(&idx) {
                let arguments: Value = serde_json::from_str(&args).unwrap_or(serde_json::json!({"raw": args}));
                events.push(Ok(StreamEvent::ToolCall { id, name, arguments }));
            }
        }
        "message_delta" => {
            if let Some(output) = v.get("usage").and_then(|u| u.get("output_tokens")).and_then(|x| x.as_u64()) {
                if let Some(u) = state.usage.as_mut() {
                    u.completion_tokens = output as u32;
                    u.total_tokens = u.prompt_tokens + u.completion_tokens;
                }
            }
            let stop_reason = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
                .map(|s| match s {
                    "end_turn" => "stop".to_string(),
                    "tool_use" => "tool_calls".to_string(),
                    other => other.to_string(),
                });
            if let Some(stop_reason) = stop_reason {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done { stop_reason: Some(stop_reason), usage: state.usage.clone() }));
            }
        }
        "message_stop" if !state.done_emitted => {
            state.done_emitted = true;
            events.push(Ok(StreamEvent::Done { stop_reason: Some("stop".into()), usage: state.usage.clone() }));
        }
        "message_stop" => {}
        "error" => {
            let msg = v.get("error").and_then(|e| e.get("message")).and_then(|v| v.as_str()).unwrap_or("unknown error");
            events.push(Ok(StreamEvent::Error { message: msg.to_string(), code: None }));
        }
        _ => {}
    }
    events
}

#[async_trait::async_trait]
impl Backend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_native_tools(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream_chat(&self, messages: &[Message], config: &ChatConfig) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(messages, config, true);

        let resp = self.authed_post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("anthropic backend \"{}\": HTTP {} - {}", self.name, status.as_u16(), text)));
        }

        let mut state = StreamState { active_tool_calls: HashMap::new(), usage: None, done_emitted: false };
        Ok(sse_response_stream(resp, move |data| parse_sse(data, &mut state)))
    }

    async fn health(&self) -> Health {
        let url = format!("{}/v1/messages", self.base_url);
        let body = serde_json::json!({"model": self.default_model, "max_tokens": 1, "messages": [{"role": "user", "content": "ping"}]});
        match self.authed_post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 400 => Health::ok(),
            Ok(resp) => Health::unhealthy(format!("HTTP {}", resp.status().as_u16())),
            Err(e) => Health::unhealthy(e.to_string()),
        }
    }
}
