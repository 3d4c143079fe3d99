//! LLM provider seam and gateway
//!
//! - [`LLMClient`] - the provider trait; one request in, one response out
//! - [`OpenAIClient`] - OpenAI-compatible HTTP implementation (OpenAI, Ollama `/v1`)
//! - [`LlmGateway`] - response classification and the structured-output re-prompt
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::{LlmGateway, Provider};
//!
//! let client = Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//! }
//! .create_client(0.2, Duration::from_secs(120))?;
//!
//! let gateway = LlmGateway::new(Arc::from(client));
//! let answer = gateway.text(vec![ChatMessage::user("What is 2+2?")]).await?;
//! ```

/// Core LLM client trait and request/response types.
pub mod client;
/// Gateway with structured output handling.
pub mod gateway;
/// OpenAI-compatible HTTP client.
pub mod openai;

pub use client::{LLMClient, LLMRequest, LLMResponse, OutputSchema, Provider};
pub use gateway::{GatewayOutput, LlmGateway, StructuredOutput};
pub use openai::OpenAIClient;
