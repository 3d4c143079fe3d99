//! # Delve - multi-agent deep research
//!
//! Delve turns a free-form research request into a structured, cited report.
//! A run is split into three phases:
//!
//! 1. **Scoping** - decide whether the request needs one clarifying question,
//!    then synthesize a research brief (topic, key areas, depth)
//! 2. **Research** - a supervisor plans rounds of subtasks and dispatches them
//!    to researcher workers in a bounded concurrent pool
//! 3. **Reporting** - one structured call turns the collected notes into a
//!    report with sections, key insights, citations and caveats
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use delve::{DelveConfig, FileStateStore, Orchestrator, Provider, RunOutcome, ToolRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DelveConfig::load("delve.toml")?;
//!
//!     let provider = Provider::try_from(&config.llm)?;
//!     let llm = provider.create_client(config.llm.temperature, config.llm.request_timeout())?;
//!     let tools = ToolRegistry::with_default_tools(config.tools.file_root.clone(), config.tools.search_results);
//!     let store = FileStateStore::new(config.storage.state_dir.clone());
//!
//!     let orchestrator = Orchestrator::new(
//!         config.research.clone(),
//!         Arc::from(llm),
//!         Arc::new(tools),
//!         Arc::new(store),
//!     )?;
//!
//!     if let RunOutcome::Completed { report, .. } =
//!         orchestrator.run("thread-1", "Compare EV and ICE manufacturing emissions").await?
//!     {
//!         println!("{}", report.to_markdown());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`research`] - scoping, supervision, researcher workers, reporting
//! - [`llm`] - provider clients and the structured-output gateway
//! - [`tools`] - the tool registry and built-in research tools
//! - [`memory`] - thread state persistence
//! - [`utils`] - TOML configuration
//! - [`cli`] - command-line parsing and terminal output

/// Command-line interface
pub mod cli;
/// LLM client implementations and the structured-output gateway
pub mod llm;
/// Thread state persistence
pub mod memory;
/// Research orchestration
pub mod research;
/// Built-in tools and registry
pub mod tools;
/// Core types (messages, tool calls, errors)
pub mod types;
/// Configuration
pub mod utils;

pub use llm::{LLMClient, LLMRequest, LLMResponse, LlmGateway, Provider};
pub use memory::{FileStateStore, InMemoryStateStore, StateStore};
pub use research::events::ResearchEvent;
pub use research::orchestrator::{Orchestrator, RunOutcome, RunPhase};
pub use research::report::Report;
pub use research::state::{ResearchBrief, ResearchDepth, ResearchState};
pub use tools::{Tool, ToolError, ToolRegistry};
pub use types::{AppError, Result};
pub use utils::{ConfigError, DelveConfig, ResearchConfig};
