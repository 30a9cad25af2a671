use agora_llm::{Tool, ToolCall};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// A native, in-process tool an agent may call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object
    fn parameters(&self) -> Value;

    async fn execute(&self, arguments: Value) -> Result<String>;
}

/// Result of executing one tool call. Errors are data, not failures: the
/// model sees them and can recover.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub result: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn ToolExecutor>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolExecutor>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolExecutor>> {
        self.tools.get(name)
    }

    /// Tool definitions for the given names, in a stable order.
    ///
    /// Unknown names are skipped with a warning so one bad agent config
    /// does not take the whole run down.
    pub fn llm_tools(&self, names: &[String]) -> Vec<Tool> {
        let mut tools = Vec::with_capacity(names.len());
        for name in names {
            match self.tools.get(name) {
                Some(tool) => tools.push(Tool::new(
                    tool.name(),
                    tool.description(),
                    tool.parameters(),
                )),
                None => tracing::warn!(tool = %name, "agent references unknown tool"),
            }
        }
        tools
    }

    /// Execute one tool call; never returns Err.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolOutcome {
        let start = Instant::now();
        let name = &call.function.name;

        let (result, is_error) = match self.tools.get(name) {
            Some(tool) => {
                let arguments = match call.arguments_value() {
                    Ok(value) => value,
                    Err(e) => {
                        return ToolOutcome {
                            tool_call_id: call.id.clone(),
                            result: format!("invalid arguments for {}: {}", name, e),
                            is_error: true,
                            duration_ms: start.elapsed().as_millis() as u64,
                        }
                    }
                };

                match tool.execute(arguments).await {
                    Ok(output) => (output, false),
                    Err(e) => (format!("tool {} failed: {}", name, e), true),
                }
            }
            None => (format!("unknown tool: {}", name), true),
        };

        ToolOutcome {
            tool_call_id: call.id.clone(),
            result,
            is_error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Built-in tool: current UTC time.
pub struct ClockTool;

#[async_trait]
impl ToolExecutor for ClockTool {
    fn name(&self) -> &str {
        "now"
    }

    fn description(&self) -> &str {
        "Returns the current UTC date and time in RFC 3339 format"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<String> {
        Ok(chrono::Utc::now().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::FunctionCall;

    struct FailingTool;

    #[async_trait]
    impl ToolExecutor for FailingTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        fn parameters(&self) -> Value {
            serde_json::json!({ "type": "object" })
        }

        async fn execute(&self, _arguments: Value) -> Result<String> {
            anyhow::bail!("deliberate failure")
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn clock_tool_returns_rfc3339() {
        let registry = ToolRegistry::new().with_tool(Arc::new(ClockTool));
        let outcome = registry.execute_call(&call("now", "{}")).await;

        assert!(!outcome.is_error);
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.result).is_ok());
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.execute_call(&call("missing", "{}")).await;

        assert!(outcome.is_error);
        assert!(outcome.result.contains("unknown tool"));
    }

    #[tokio::test]
    async fn tool_failure_is_reported_not_propagated() {
        let registry = ToolRegistry::new().with_tool(Arc::new(FailingTool));
        let outcome = registry.execute_call(&call("flaky", "{}")).await;

        assert!(outcome.is_error);
        assert!(outcome.result.contains("deliberate failure"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_an_error_outcome() {
        let registry = ToolRegistry::new().with_tool(Arc::new(ClockTool));
        let outcome = registry.execute_call(&call("now", "{not json")).await;

        assert!(outcome.is_error);
    }

    #[test]
    fn llm_tools_skips_unknown_names() {
        let registry = ToolRegistry::new().with_tool(Arc::new(ClockTool));
        let tools = registry.llm_tools(&["now".to_string(), "missing".to_string()]);

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "now");
    }
}
