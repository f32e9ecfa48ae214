use super::error::{ToolError, ToolResult};
use super::traits::Tool;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-call budget of `ToolRegistry::new`; must cover engine startup plus synthesis
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tool metadata as advertised to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A registry for managing available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    /// `None` waits for the tool however long it takes
    call_timeout: Option<Duration>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self::with_call_timeout(Some(call_timeout))
    }

    /// Registry whose calls run unbounded when `call_timeout` is `None`
    pub fn with_call_timeout(call_timeout: Option<Duration>) -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
            call_timeout,
        }
    }

    /// Register a new tool (replaces one with the same name)
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(target: "tool_registry", tool = %name, "Replaced existing tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of all registered tools, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name(),
                description: t.description(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Call a tool by name with timeout
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResult<String> {
        let start_time = Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let result = match self.call_timeout {
            Some(budget) => match timeout(budget, tool.call(arguments)).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(target: "tool_registry", tool = %name, "Tool execution timed out");
                    Err(ToolError::Timeout)
                }
            },
            None => tool.call(arguments).await,
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                debug!(target: "tool_registry", tool = %name, elapsed_ms = elapsed_ms, "Tool succeeded")
            }
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, code = e.code(), error = %e, elapsed_ms = elapsed_ms, "Tool execution failed")
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> String {
            "echo".to_string()
        }
        fn description(&self) -> String {
            "Echo the text argument".to_string()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn call(&self, arguments: Value) -> ToolResult<String> {
            arguments["text"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text'".to_string()))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> String {
            "sleepy".to_string()
        }
        fn description(&self) -> String {
            String::new()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> ToolResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    struct Sluggish;

    #[async_trait]
    impl Tool for Sluggish {
        fn name(&self) -> String {
            "sluggish".to_string()
        }
        fn description(&self) -> String {
            String::new()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> ToolResult<String> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn calls_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        assert_eq!(registry.len(), 1);

        let out = registry.call("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.call("nope", json!({})).await.unwrap_err();
        assert_eq!(err.code(), "TOOL_NOT_FOUND");
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let registry = ToolRegistry::with_timeout(Duration::from_millis(20));
        registry.register(Arc::new(Sleepy));
        let err = registry.call("sleepy", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout));
    }

    #[tokio::test]
    async fn unbounded_registry_waits_for_slow_tool() {
        let registry = ToolRegistry::with_call_timeout(None);
        registry.register(Arc::new(Sluggish));
        let out = registry.call("sluggish", json!({})).await.unwrap();
        assert_eq!(out, "done");
    }

    #[test]
    fn definitions_are_sorted() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Sleepy));
        registry.register(Arc::new(Echo));
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "sleepy"]);
    }
}
