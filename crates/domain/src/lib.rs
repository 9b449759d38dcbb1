//! Shared data model, error type, and config schema for the agent gateway.

pub mod agent;
pub mod circuit;
pub mod config;
pub mod convert;
pub mod error;
pub mod interrupt;
pub mod stream;
pub mod tool;
pub mod trace;

pub use agent::{generate_agent_id, Agent, AgentRole, AgentStatus};
pub use circuit::CircuitState;
pub use config::Config;
pub use error::{Error, Result};
pub use interrupt::{InterruptPayload, InterruptReason, InterruptResponse, PendingInterrupt, ResumePayload};
pub use stream::{BoxStream, StreamEvent, Usage};
pub use tool::{Message, Role, ToolCall, ToolDefinition, ToolErrorDetail, ToolResult};
pub use trace::TraceEvent;
