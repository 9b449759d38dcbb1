//! Backend interface, provider adapters, and the fallback-chain registry (§4.A, §4.B).

pub mod anthropic;
pub mod local;
pub mod openai;
pub mod registry;
mod sse;
pub mod traits;

pub use anthropic::AnthropicBackend;
pub use local::LocalBackend;
pub use openai::OpenAiBackend;
pub use registry::BackendRegistry;
pub use traits::{Backend, ChatConfig, Health};

use agw_domain::config::{BackendKind, Config};
use agw_domain::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Construct a [`BackendRegistry`] from the gateway's [`Config`], instantiating
/// the adapter that matches each configured backend's `kind`.
pub fn build_registry(config: &Config) -> Result<BackendRegistry> {
    let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();

    for (name, cfg) in &config.llm.backends {
        let api_key = cfg
            .api_key_env
            .as_ref()
            .and_then(|env| std::env::var(env).ok())
            .unwrap_or_default();
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "default".into());

        let backend: Arc<dyn Backend> = match cfg.kind {
            BackendKind::Anthropic => Arc::new(AnthropicBackend::new(
                name.clone(),
                cfg.base_url.clone(),
                api_key,
                default_model,
                cfg.request_timeout_ms,
            )?),
            BackendKind::Openai => Arc::new(OpenAiBackend::new(
                name.clone(),
                cfg.base_url.clone(),
                if api_key.is_empty() { None } else { Some(api_key) },
                default_model,
                cfg.supports_native_tools,
                cfg.request_timeout_ms,
            )?),
            BackendKind::Local => Arc::new(LocalBackend::new(
                name.clone(),
                cfg.base_url.clone(),
                default_model,
                cfg.request_timeout_ms,
            )?),
        };
        backends.insert(name.clone(), backend);
    }

    let mut chain = vec![config.llm.active.clone()];
    chain.extend(config.llm.fallback_chain.iter().cloned());

    Ok(BackendRegistry::new(
        backends,
        chain,
        std::time::Duration::from_millis(config.llm.health_probe_timeout_ms),
    ))
}
