//! Shared error type used across all agent-gateway crates.

/// Error kinds propagated from backends, MCP, the tool loop, and the
/// registries. Mirrors §7 of the spec.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("backend stream error: {0}")]
    BackendStream(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("no leader registered")]
    NoLeader,

    #[error("invalid run id: {0}")]
    InvalidRunId(String),

    #[error("only leader agents may create interrupts")]
    InterruptAuthorization,

    #[error("no context pack persisted for run id: {0}")]
    MissingContextPack(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}
