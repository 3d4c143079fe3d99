//! Built-in tools for researcher workers
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - Tool trait, registration and timed invocation
//! - [`search`](crate::tools::search) - Web search (daedra / DuckDuckGo)
//! - [`file`](crate::tools::file) - Read-only access to a local document root
//! - [`calculator`](crate::tools::calculator) - Arithmetic
//! - [`think`](crate::tools::think) - Reflection step, always bound
//!
//! Tool failures are never fatal to a run: the registry turns them into
//! [`ToolResult`](crate::types::ToolResult) failures that are fed back to the
//! model as observations.

/// Calculator tool for arithmetic operations.
pub mod calculator;
/// Local document tools.
pub mod file;
/// Tool registry for managing available tools.
pub mod registry;
/// Web search tool using DuckDuckGo.
pub mod search;
/// Reflection tool.
pub mod think;

pub use registry::{Tool, ToolError, ToolRegistry, THINK_TOOL};
