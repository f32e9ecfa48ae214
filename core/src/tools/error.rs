use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The operation ran and failed; the message is already caller-facing
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Timeout")]
    Timeout,
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "TOOL_NOT_FOUND",
            ToolError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            ToolError::ExecutionFailed(_) => "EXECUTION_FAILED",
            ToolError::Timeout => "TIMEOUT",
        }
    }
}

impl From<crate::VoxError> for ToolError {
    fn from(e: crate::VoxError) -> Self {
        ToolError::ExecutionFailed(e.to_message())
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
