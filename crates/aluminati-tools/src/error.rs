//! Tool and registry error types.

use thiserror::Error;

/// Failure inside a single tool execution. The registry turns it into an
/// error tool result; it never aborts the agent run.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArguments(e.to_string())
    }
}

/// Rejected tool registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool '{tool}' declares an invalid parameter schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}
