//! TOML-based configuration for Delve
//!
//! Everything a run needs is declared in `delve.toml`: research limits and
//! timeouts, the model provider, tool settings, state storage and logging.
//! Every field has a default, so an empty file (or no file) is valid except
//! for provider credentials, which are read from the environment.

use crate::research::state::ResearchDepth;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from delve.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DelveConfig {
    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Research Configuration =============

/// Limits and timeouts for one research run. Passed to the orchestrator at
/// construction; there is no global copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    #[serde(default = "default_max_concurrent_researchers")]
    pub max_concurrent_researchers: usize,

    #[serde(default = "default_max_researcher_iterations")]
    pub max_researcher_iterations: u32,

    #[serde(default)]
    pub default_depth: ResearchDepth,

    /// Model calls a single worker may make before giving up
    #[serde(default = "default_max_worker_steps")]
    pub max_worker_steps: usize,

    #[serde(default = "default_true")]
    pub allow_clarification: bool,

    #[serde(default = "default_true")]
    pub compress_findings: bool,

    #[serde(default = "default_scoping_timeout")]
    pub scoping_timeout_secs: u64,

    #[serde(default = "default_round_timeout")]
    pub round_timeout_secs: u64,

    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,

    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_concurrent_researchers() -> usize {
    3
}

fn default_max_researcher_iterations() -> u32 {
    10
}

fn default_max_worker_steps() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_scoping_timeout() -> u64 {
    120
}

fn default_round_timeout() -> u64 {
    900
}

fn default_worker_timeout() -> u64 {
    300
}

fn default_report_timeout() -> u64 {
    300
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_researchers: default_max_concurrent_researchers(),
            max_researcher_iterations: default_max_researcher_iterations(),
            default_depth: ResearchDepth::default(),
            max_worker_steps: default_max_worker_steps(),
            allow_clarification: true,
            compress_findings: true,
            scoping_timeout_secs: default_scoping_timeout(),
            round_timeout_secs: default_round_timeout(),
            worker_timeout_secs: default_worker_timeout(),
            report_timeout_secs: default_report_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=5).contains(&self.max_concurrent_researchers) {
            return Err(ConfigError::ValidationError(format!(
                "research.max_concurrent_researchers must be between 1 and 5 (got {})",
                self.max_concurrent_researchers
            )));
        }
        if self.max_researcher_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_researcher_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_worker_steps == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_worker_steps must be at least 1".to_string(),
            ));
        }

        for (name, secs) in [
            ("scoping_timeout_secs", self.scoping_timeout_secs),
            ("round_timeout_secs", self.round_timeout_secs),
            ("worker_timeout_secs", self.worker_timeout_secs),
            ("report_timeout_secs", self.report_timeout_secs),
            ("tool_timeout_secs", self.tool_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "research.{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn scoping_timeout(&self) -> Duration {
        Duration::from_secs(self.scoping_timeout_secs)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    #[serde(rename = "openai")]
    OpenAI {
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::Ollama {
                base_url: default_ollama_url(),
                model: default_ollama_model(),
            },
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============= Tool Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Directory the file tools may read from
    #[serde(default = "default_file_root")]
    pub file_root: PathBuf,

    #[serde(default = "default_search_results")]
    pub search_results: usize,
}

fn default_file_root() -> PathBuf {
    PathBuf::from("./docs")
}

fn default_search_results() -> usize {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            file_root: default_file_root(),
            search_results: default_search_results(),
        }
    }
}

// ============= Storage & Logging =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data/threads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(e: ConfigError) -> Self {
        crate::types::AppError::Configuration(e.to_string())
    }
}

impl DelveConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse without validating.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate ranges and env var availability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.research.validate()?;

        if let ProviderConfig::OpenAI { api_key_env, model, .. } = &self.llm.provider {
            self.validate_env_var(api_key_env)?;
            if model.trim().is_empty() {
                return Err(ConfigError::ValidationError("llm.model must not be empty".to_string()));
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be between 0.0 and 2.0 (got {})",
                self.llm.temperature
            )));
        }

        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.tools.search_results == 0 {
            return Err(ConfigError::ValidationError(
                "tools.search_results must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(()),
            _ => Err(ConfigError::MissingEnvVar(name.to_string())),
        }
    }

    /// Render back to TOML (used by `delve config --full`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
