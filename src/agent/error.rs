//! Failures that terminate an orchestration run.

use crate::types::ParamType;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model response contained no `FUNCTION_CALL:` / `FINAL_ANSWER:` line.
    #[error("no directive line found in model response: {response:?}")]
    Protocol { response: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required argument '{param}' for tool '{tool}'")]
    MissingArgument { tool: String, param: String },

    #[error("cannot coerce {value:?} to {expected} for parameter '{param}'")]
    TypeCoercion {
        param: String,
        expected: ParamType,
        value: String,
    },

    /// The channel to the tool server failed; the tool never produced a result.
    #[error("invocation of tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model call failed: {0}")]
    Model(String),
}

impl AgentError {
    /// Short stable name of the error kind, used in the run journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol { .. } => "protocol",
            Self::UnknownTool(_) => "unknown_tool",
            Self::MissingArgument { .. } => "missing_argument",
            Self::TypeCoercion { .. } => "type_coercion",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::Timeout(_) => "timeout",
            Self::Model(_) => "model",
        }
    }
}
