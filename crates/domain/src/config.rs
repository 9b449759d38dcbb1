//! Gateway configuration schema (§6 "Configuration surface").
//!
//! Every field carries a serde default so a missing or partial TOML file
//! still produces a valid [`Config`]; unrecognized keys are ignored rather
//! than rejected, matching the forward-compat stance the rest of the
//! wire protocol uses.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub interrupts: InterruptStoreConfig,
}

impl Config {
    /// Load from the path named by `AGW_CONFIG` (or `config.toml` by
    /// default). Falls back to [`Config::default`] when the file is absent.
    pub fn load() -> crate::error::Result<(Config, String)> {
        let path = std::env::var("AGW_CONFIG").unwrap_or_else(|_| "config.toml".into());
        let config = if std::path::Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path)?;
            toml::from_str(&raw).map_err(|e| crate::error::Error::Config(e.to_string()))?
        } else {
            Config::default()
        };
        Ok((config, path))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue::error("server.host", "host must not be empty"));
        }

        if self.llm.backends.is_empty() {
            issues.push(ConfigIssue::error("llm.backends", "no backends configured"));
        }
        if !self.llm.backends.contains_key(&self.llm.active) {
            issues.push(ConfigIssue::error(
                "llm.active",
                format!("active backend \"{}\" is not defined in llm.backends", self.llm.active),
            ));
        }
        for name in &self.llm.fallback_chain {
            if !self.llm.backends.contains_key(name) {
                issues.push(ConfigIssue::error(
                    "llm.fallback_chain",
                    format!("fallback backend \"{name}\" is not defined in llm.backends"),
                ));
            }
        }
        for (name, backend) in &self.llm.backends {
            if backend.base_url.is_empty() {
                issues.push(ConfigIssue::error(
                    format!("llm.backends.{name}.base_url"),
                    "base_url must not be empty",
                ));
            } else if !backend.base_url.starts_with("http://") && !backend.base_url.starts_with("https://") {
                issues.push(ConfigIssue::error(
                    format!("llm.backends.{name}.base_url"),
                    format!("base_url must start with http:// or https:// (got \"{}\")", backend.base_url),
                ));
            }
        }

        if self.mcp.base_url.is_empty() {
            issues.push(ConfigIssue::warning("mcp.base_url", "no MCP tool server configured"));
        } else if !self.mcp.base_url.starts_with("http://") && !self.mcp.base_url.starts_with("https://") {
            issues.push(ConfigIssue::error(
                "mcp.base_url",
                format!("base_url must start with http:// or https:// (got \"{}\")", self.mcp.base_url),
            ));
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            issues.push(ConfigIssue::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.registry.heartbeat_timeout_ms < MIN_HEARTBEAT_TIMEOUT_MS {
            issues.push(ConfigIssue::error(
                "registry.heartbeat_timeout_ms",
                format!("heartbeat_timeout_ms must be at least {MIN_HEARTBEAT_TIMEOUT_MS}ms (got {})", self.registry.heartbeat_timeout_ms),
            ));
        }

        issues
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Error, field: field.into(), message: message.into() }
    }
    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Warning, field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: d_port(), host: d_host(), cors: CorsConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allowed_origins: d_cors_origins() }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM backends
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the backend tried first (§4.B).
    #[serde(default = "d_active")]
    pub active: String,
    /// Ordered fallback chain tried after `active` fails its circuit check.
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    /// Registered backends, keyed by name.
    #[serde(default)]
    pub backends: std::collections::HashMap<String, BackendConfig>,
    #[serde(default = "d_probe_timeout_ms")]
    pub health_probe_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            active: d_active(),
            fallback_chain: Vec::new(),
            backends: std::collections::HashMap::new(),
            health_probe_timeout_ms: d_probe_timeout_ms(),
        }
    }
}

fn d_active() -> String {
    "default".into()
}
fn d_probe_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Wire style this backend speaks: `"anthropic"`, `"openai"`, or `"local"`.
    pub kind: BackendKind,
    pub base_url: String,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Env var holding the API key. Unset for backends that need none.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub supports_native_tools: bool,
}

fn d_request_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Anthropic,
    Openai,
    Local,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "d_mcp_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "d_mcp_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "d_mcp_list_ttl_secs")]
    pub list_tools_ttl_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            call_timeout_ms: d_mcp_call_timeout_ms(),
            health_timeout_ms: d_mcp_health_timeout_ms(),
            list_tools_ttl_secs: d_mcp_list_ttl_secs(),
        }
    }
}

fn d_mcp_call_timeout_ms() -> u64 {
    20_000
}
fn d_mcp_health_timeout_ms() -> u64 {
    5_000
}
fn d_mcp_list_ttl_secs() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Default max tool calls per run; 0 means unlimited (§4.F).
    #[serde(default = "d_max_tool_calls")]
    pub default_max_tool_calls: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { default_max_tool_calls: d_max_tool_calls() }
    }
}

fn d_max_tool_calls() -> u32 {
    10
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Floor for `registry.heartbeat_timeout_ms` (§3): a lower value would
/// mark every agent dead on the next reap.
pub const MIN_HEARTBEAT_TIMEOUT_MS: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "d_registry_path")]
    pub persistence_path: String,
    #[serde(default = "d_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            persistence_path: d_registry_path(),
            heartbeat_timeout_ms: d_heartbeat_timeout_ms(),
        }
    }
}

fn d_registry_path() -> String {
    "state/agents.json".into()
}
fn d_heartbeat_timeout_ms() -> i64 {
    30_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interrupts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptStoreConfig {
    #[serde(default = "d_interrupts_dir")]
    pub state_dir: String,
}

impl Default for InterruptStoreConfig {
    fn default() -> Self {
        Self { state_dir: d_interrupts_dir() }
    }
}

fn d_interrupts_dir() -> String {
    "state/interrupts".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut backends = std::collections::HashMap::new();
        backends.insert(
            "default".into(),
            BackendConfig {
                kind: BackendKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                default_model: Some("claude-sonnet".into()),
                api_key_env: Some("ANTHROPIC_API_KEY".into()),
                request_timeout_ms: 60_000,
                supports_native_tools: true,
            },
        );
        Config {
            llm: LlmConfig { active: "default".into(), backends, ..LlmConfig::default() },
            mcp: McpConfig { base_url: "http://localhost:9000".into(), ..McpConfig::default() },
            ..Config::default()
        }
    }

    #[test]
    fn empty_config_has_defaults_and_parses() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.limits.default_max_tool_calls, 10);
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn unknown_active_backend_is_error() {
        let mut cfg = valid_config();
        cfg.llm.active = "missing".into();
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "llm.active" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn unknown_fallback_backend_is_error() {
        let mut cfg = valid_config();
        cfg.llm.fallback_chain.push("ghost".into());
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "llm.fallback_chain"));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues.iter().find(|i| i.field == "server.cors.allowed_origins").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn heartbeat_timeout_below_floor_is_error() {
        let mut cfg = valid_config();
        cfg.registry.heartbeat_timeout_ms = 0;
        let issues = cfg.validate();
        let issue = issues.iter().find(|i| i.field == "registry.heartbeat_timeout_ms").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn heartbeat_timeout_at_floor_passes() {
        let mut cfg = valid_config();
        cfg.registry.heartbeat_timeout_ms = MIN_HEARTBEAT_TIMEOUT_MS;
        let issues = cfg.validate();
        assert!(!issues.iter().any(|i| i.field == "registry.heartbeat_timeout_ms"));
    }

    #[test]
    fn missing_mcp_base_url_is_warning_not_error() {
        let cfg = valid_config();
        let mut cfg = cfg;
        cfg.mcp.base_url = String::new();
        let issues = cfg.validate();
        let issue = issues.iter().find(|i| i.field == "mcp.base_url").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn bad_backend_url_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.backends.get_mut("default").unwrap().base_url = "ftp://x".into();
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field.contains("base_url") && i.severity == ConfigSeverity::Error));
    }
}
