//! LLM Gateway
//!
//! Thin policy layer over an [`LLMClient`]: classifies responses as text,
//! structured output or tool requests, and implements the single re-prompt
//! used for structured calls.

use crate::llm::client::{LLMClient, LLMRequest, OutputSchema};
use crate::types::{AppError, ChatMessage, Result, ToolCall, ToolDefinition};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A type the model can be asked to produce as JSON.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Schema name sent to the provider.
    const NAME: &'static str;

    /// Semantic checks beyond the JSON shape.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    fn output_schema() -> OutputSchema {
        let schema = schemars::schema_for!(Self);
        OutputSchema {
            name: Self::NAME.to_string(),
            schema: serde_json::to_value(&schema).unwrap_or(Value::Null),
        }
    }
}

/// Classified result of one gateway invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutput {
    Text(String),
    Structured(Value),
    ToolRequest {
        content: String,
        calls: Vec<ToolCall>,
    },
}

#[derive(Clone)]
pub struct LlmGateway {
    client: Arc<dyn LLMClient>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Invoke the model once.
    ///
    /// Tool calls take precedence over content. With a schema and no tool
    /// calls the content must parse as JSON.
    pub async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        schema: Option<OutputSchema>,
        tools: Vec<ToolDefinition>,
    ) -> Result<GatewayOutput> {
        let has_schema = schema.is_some();
        let request = LLMRequest {
            messages,
            schema,
            tools,
        };
        let response = self.client.generate(&request).await?;

        if !response.tool_calls.is_empty() {
            return Ok(GatewayOutput::ToolRequest {
                content: response.content,
                calls: response.tool_calls,
            });
        }

        if has_schema {
            let value: Value = serde_json::from_str(extract_json(&response.content))?;
            return Ok(GatewayOutput::Structured(value));
        }

        Ok(GatewayOutput::Text(response.content))
    }

    /// Plain text completion.
    pub async fn text(&self, messages: Vec<ChatMessage>) -> Result<String> {
        match self.invoke(messages, None, Vec::new()).await? {
            GatewayOutput::Text(text) => Ok(text),
            GatewayOutput::ToolRequest { content, .. } => Ok(content),
            GatewayOutput::Structured(value) => Ok(value.to_string()),
        }
    }

    /// Ask for a `T`, re-prompting once with the failure appended.
    pub async fn structured<T: StructuredOutput>(&self, messages: Vec<ChatMessage>) -> Result<T> {
        let schema = T::output_schema();

        let (raw, err) = match self.attempt::<T>(messages.clone(), &schema).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        tracing::warn!(schema = T::NAME, error = %err, "Structured output failed, re-prompting once");

        let mut retry = messages;
        if let Some(raw) = raw {
            retry.push(ChatMessage::assistant(raw, Vec::new()));
        }
        retry.push(ChatMessage::user(format!(
            "Your previous response could not be used: {}\n\
             Respond again with a single JSON object that matches the required schema.",
            err
        )));

        self.attempt::<T>(retry, &schema)
            .await
            .map_err(|(_, err)| err)
    }

    async fn attempt<T: StructuredOutput>(
        &self,
        messages: Vec<ChatMessage>,
        schema: &OutputSchema,
    ) -> std::result::Result<T, (Option<String>, AppError)> {
        let request = LLMRequest::new(messages).with_schema(schema.clone());
        let response = self.client.generate(&request).await.map_err(|e| (None, e))?;
        let raw = response.content;

        let parsed: T = match serde_json::from_str(extract_json(&raw)) {
            Ok(parsed) => parsed,
            Err(e) => return Err((Some(raw), AppError::MalformedOutput(e.to_string()))),
        };

        match parsed.validate() {
            Ok(()) => Ok(parsed),
            Err(reason) => Err((Some(raw), AppError::MalformedOutput(reason))),
        }
    }
}

/// Strip markdown code fences and surrounding prose from a JSON reply.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if unfenced.starts_with('{') || unfenced.starts_with('[') {
        return unfenced;
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => &unfenced[start..=end],
        _ => unfenced,
    }
}
