//! OpenAI-compatible adapter (§4.A "Variants").
//!
//! Works against OpenAI, Azure OpenAI-compatible, and local servers (Ollama,
//! vLLM, LM Studio) that speak the chat-completions wire format. System
//! messages travel in the messages list rather than a separate field.

use crate::sse::sse_response_stream;
use crate::traits::{Backend, ChatConfig, Health};
use agw_domain::convert::to_openai;
use agw_domain::error::{Error, Result};
use agw_domain::stream::{BoxStream, StreamEvent, Usage};
use agw_domain::tool::Message;
use serde_json::Value;

pub struct OpenAiBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    supports_native_tools: bool,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
        supports_native_tools: bool,
        timeout_ms: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            supports_native_tools,
            client,
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }

    fn build_body(&self, messages: &[Message], config: &ChatConfig, stream: bool) -> Value {
        let model = config.model.clone().unwrap_or_else(|| self.default_model.clone());
        let mut body = serde_json::json!({
            "model": model,
            "messages": to_openai(messages),
            "stream": stream,
        });
        if self.supports_native_tools && !config.tools.is_empty() {
            let tools: Vec<Value> = config.tools.iter().map(|t| t.to_openai()).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = config.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn parse_sse(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done { stop_reason: Some("stop".into()), usage: None })];
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());
    let Some(choice) = choice else {
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            return vec![Ok(StreamEvent::Done { stop_reason: None, usage: Some(usage) })];
        }
        return Vec::new();
    };

    let delta = choice.get("delta").cloned().unwrap_or(Value::Null);

    if let Some(fr) = choice.get("finish_reason").and_then(|v| v.as_str()) {
        let usage = v.get("usage").and_then(parse_usage);
        return vec![Ok(StreamEvent::Done { stop_reason: Some(fr.to_string()), usage })];
    }

    let mut events = Vec::new();
    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            if let (Some(id), Some(func)) = (tc.get("id").and_then(|v| v.as_str()), tc.get("function")) {
                let name = func.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let args_str = func.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                let arguments: Value = serde_json::from_str(args_str).unwrap_or(serde_json::json!({"raw": args_str}));
                events.push(Ok(StreamEvent::ToolCall { id: id.to_string(), name, arguments }));
            }
        }
    }
    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Delta { text: text.to_string() }));
        }
    }
    events
}

#[async_trait::async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_native_tools(&self) -> bool {
        self.supports_native_tools
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream_chat(&self, messages: &[Message], config: &ChatConfig) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(messages, config, true);

        let resp = self.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("openai backend \"{}\": HTTP {} - {}", self.name, status.as_u16(), text)));
        }

        Ok(sse_response_stream(resp, parse_sse))
    }

    async fn health(&self) -> Health {
        let url = format!("{}/models", self.base_url);
        match self.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => Health::ok(),
            Ok(resp) => Health::unhealthy(format!("HTTP {}", resp.status().as_u16())),
            Err(e) => Health::unhealthy(e.to_string()),
        }
    }
}
