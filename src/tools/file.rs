//! Local file tools
//!
//! Read-only access to a configured document root. Every path is resolved
//! against the root and rejected if it escapes it after canonicalization.

use crate::tools::registry::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Characters returned before a file's content is truncated.
const MAX_READ_CHARS: usize = 50_000;

fn resolve_within(root: &Path, path: &str) -> Result<PathBuf, ToolError> {
    let root = root
        .canonicalize()
        .map_err(|e| ToolError::Execution(format!("File root unavailable: {}", e)))?;

    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let resolved = joined
        .canonicalize()
        .map_err(|_| ToolError::Execution(format!("Path not found: {}", path)))?;

    if !resolved.starts_with(&root) {
        return Err(ToolError::InvalidArguments(format!(
            "Path escapes the document root: {}",
            path
        )));
    }

    Ok(resolved)
}

/// Tool for reading a local document
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a local document under the research document root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the document root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = args["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("path is required".to_string()))?;

        let full_path = resolve_within(&self.root, path)?;
        if !full_path.is_file() {
            return Err(ToolError::InvalidArguments(format!("Not a file: {}", path)));
        }

        let content = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to read {}: {}", path, e)))?;

        let content = if content.chars().count() > MAX_READ_CHARS {
            let truncated: String = content.chars().take(MAX_READ_CHARS).collect();
            format!("{}\n...[truncated]", truncated)
        } else {
            content
        };

        Ok(Value::String(format!("Content of {}:\n\n{}", path, content)))
    }
}

/// Tool for listing the documents available under the root
pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory under the research document root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory relative to the document root (default: the root itself)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let directory = args["directory"].as_str().unwrap_or(".");
        let dir = resolve_within(&self.root, directory)?;

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to list {}: {}", directory, e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            files.push(if is_dir { format!("{}/", name) } else { name });
        }
        files.sort();

        if files.is_empty() {
            return Ok(Value::String(format!("No files found in {}", directory)));
        }

        Ok(Value::String(format!(
            "Files in {}:\n{}",
            directory,
            files
                .iter()
                .map(|f| format!("- {}", f))
                .collect::<Vec<_>>()
                .join("\n")
        )))
    }
}
