//! Tool server trait (the request/response channel the loop talks to).

use crate::types::{Arguments, ToolDescriptor, ToolResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures. A tool whose operation fails still answers
/// with `Ok(ToolResponse { is_error: true, .. })`.
#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn tool server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool server I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tool server sent invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("tool server returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool server protocol error: {0}")]
    Protocol(String),
    #[error("tool server terminated unexpectedly")]
    Terminated,
}

/// A server publishing a fixed catalog of named tools.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// The ordered tool catalog. Does not change during a session.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    /// Execute one tool with named arguments.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<ToolResponse, ToolInvokeError>;
}
