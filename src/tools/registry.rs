use crate::types::{ToolCall, ToolDefinition, ToolOutcome, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Name of the reflection tool. It is bound for every worker regardless of hints.
pub const THINK_TOOL: &str = "think";

/// Failure of a single tool invocation.
///
/// Tool errors never end a run; they are rendered as observations for the
/// model that requested the call.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Tool execution timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Callable capabilities available to researcher workers.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a registry with the built-in research tools
    /// (web search, file read/list, calculator, think).
    pub fn with_default_tools(file_root: PathBuf, search_results: usize) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(crate::tools::search::SearchTool::new(search_results)));
        registry.register(Arc::new(crate::tools::file::ReadFileTool::new(file_root.clone())));
        registry.register(Arc::new(crate::tools::file::ListFilesTool::new(file_root)));
        registry.register(Arc::new(crate::tools::calculator::Calculator));
        registry.register(Arc::new(crate::tools::think::ThinkTool));

        registry
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Definitions of every registered tool, in name order.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| Self::definition(tool.as_ref())).collect()
    }

    /// Definitions restricted to `hints`. An empty hint list selects every
    /// tool; the think tool is always included when registered.
    pub fn get_tool_definitions_for(&self, hints: &[String]) -> Vec<ToolDefinition> {
        if hints.is_empty() {
            return self.get_tool_definitions();
        }

        self.tools
            .iter()
            .filter(|(name, _)| name.as_str() == THINK_TOOL || hints.iter().any(|h| h == *name))
            .map(|(_, tool)| Self::definition(tool.as_ref()))
            .collect()
    }

    fn definition(tool: &dyn Tool) -> ToolDefinition {
        ToolDefinition {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }

    /// Invoke a tool by name, bounded by the registry timeout.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match timeout(self.timeout, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout)),
        }
    }

    /// Execute a model-requested call and wrap the outcome for the transcript.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolResult {
        let outcome = match self.call(&call.name, call.arguments.clone()).await {
            Ok(value) => ToolOutcome::Success(value),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolOutcome::Failure(e.to_string())
            }
        };

        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            outcome,
        }
    }

    /// Get a list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Check if a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
