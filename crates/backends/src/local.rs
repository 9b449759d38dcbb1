//! Local/text-only adapter (§4.A "Variants").
//!
//! Speaks the same chat-completions wire format as [`crate::openai`] but
//! always reports `supports_native_tools = false`: tool calls must arrive
//! embedded in assistant text and be extracted by the XML tool parser.

use crate::openai::OpenAiBackend;
use crate::traits::{Backend, ChatConfig, Health};
use agw_domain::error::Result;
use agw_domain::stream::{BoxStream, StreamEvent};
use agw_domain::tool::Message;

pub struct LocalBackend {
    inner: OpenAiBackend,
    name: String,
}

impl LocalBackend {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, default_model: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let name = name.into();
        let inner = OpenAiBackend::new(name.clone(), base_url, None, default_model, false, timeout_ms)?;
        Ok(Self { inner, name })
    }
}

#[async_trait::async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_native_tools(&self) -> bool {
        false
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn stream_chat(&self, messages: &[Message], config: &ChatConfig) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.inner.stream_chat(messages, config).await
    }

    async fn health(&self) -> Health {
        self.inner.health().await
    }
}
