//! JSON-RPC 2.0 over HTTP client for the external MCP tool server (§4.C).

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::{McpClient, McpHealth};

