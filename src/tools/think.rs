//! Reflection tool
//!
//! Does nothing except echo the reflection back. Binding it forces the model
//! to spend an explicit step reasoning about progress and gaps between searches.

use crate::tools::registry::{Tool, ToolError, THINK_TOOL};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        THINK_TOOL
    }

    fn description(&self) -> &str {
        "Record a reflection on research progress: what was found, what is missing, and what to do next"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reflection": {
                    "type": "string",
                    "description": "Your reflection on findings, gaps and next steps"
                }
            },
            "required": ["reflection"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let reflection = args
            .get("reflection")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'reflection'".to_string()))?;

        Ok(Value::String(format!("Reflection recorded: {}", reflection)))
    }
}
