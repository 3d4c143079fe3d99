use crate::tools::registry::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform arithmetic on two numbers (sqrt uses only 'a')"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide", "power", "sqrt"]
                },
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["operation", "a"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let op = args["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation'".to_string()))?;
        let a = args["a"]
            .as_f64()
            .ok_or_else(|| ToolError::InvalidArguments("'a' must be a number".to_string()))?;
        let b = || {
            args["b"]
                .as_f64()
                .ok_or_else(|| ToolError::InvalidArguments("'b' must be a number".to_string()))
        };

        let result = match op {
            "add" => a + b()?,
            "subtract" => a - b()?,
            "multiply" => a * b()?,
            "divide" => {
                let b = b()?;
                if b == 0.0 {
                    return Err(ToolError::Execution("Division by zero".to_string()));
                }
                a / b
            }
            "power" => a.powf(b()?),
            "sqrt" => {
                if a < 0.0 {
                    return Err(ToolError::Execution(
                        "Square root of a negative number".to_string(),
                    ));
                }
                a.sqrt()
            }
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Unknown operation: {}",
                    other
                )))
            }
        };

        Ok(json!({ "result": result }))
    }
}
