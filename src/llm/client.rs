//! LLM client abstraction and provider selection
//!
//! Every provider implements [`LLMClient`]. Requests carry the full message
//! list plus an optional output schema and optional tool bindings, so the
//! same seam serves structured calls (scoping, report), tool-calling loops
//! (supervisor, workers) and plain text calls (compression).

use crate::types::{AppError, ChatMessage, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// JSON schema constraining a structured response.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Short identifier sent to providers that require a schema name.
    pub name: String,
    pub schema: Value,
}

/// One model invocation.
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    pub messages: Vec<ChatMessage>,
    pub schema: Option<OutputSchema>,
    pub tools: Vec<ToolDefinition>,
}

impl LLMRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Content of the last message, handy for routing in test doubles.
    pub fn last_content(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }

    /// Whether a tool with this name is bound to the request.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run one completion.
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
            finish_reason: "tool_calls".to_string(),
        }
    }
}

/// Provider enum for runtime selection
///
/// Both variants speak the OpenAI chat-completions protocol; Ollama is
/// reached through its OpenAI-compatible `/v1` endpoint.
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn create_client(&self, temperature: f32, timeout: Duration) -> Result<Box<dyn LLMClient>> {
        let client = match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => super::openai::OpenAIClient::new(
                Some(api_key.clone()),
                api_base.clone(),
                model.clone(),
                temperature,
                timeout,
            )?,
            Provider::Ollama { base_url, model } => super::openai::OpenAIClient::new(
                None,
                format!("{}/v1", base_url.trim_end_matches('/')),
                model.clone(),
                temperature,
                timeout,
            )?,
        };
        Ok(Box::new(client))
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

impl TryFrom<&crate::utils::toml_config::LlmConfig> for Provider {
    type Error = AppError;

    fn try_from(config: &crate::utils::toml_config::LlmConfig) -> Result<Self> {
        use crate::utils::toml_config::ProviderConfig;

        match &config.provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                })
            }
            ProviderConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
        }
    }
}
