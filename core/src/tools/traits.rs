use super::error::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// A named operation callable by a remote client (e.g. over MCP)
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "speak_text")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// The JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Execute the tool; `Ok` carries the text shown to the caller
    async fn call(&self, arguments: Value) -> ToolResult<String>;
}
