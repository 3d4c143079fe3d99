//! Search tool implementation using daedra
//!
//! Web search via the daedra crate (DuckDuckGo backend). Results are
//! deduplicated by URL and rendered as a numbered text block the model can
//! cite from directly.

use crate::tools::registry::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Web search tool powered by daedra
pub struct SearchTool {
    max_results: usize,
}

impl SearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Drop hits whose URL has already been seen, keeping first occurrence order.
pub fn dedup_hits(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.url.trim_end_matches('/').to_string()))
        .collect()
}

/// Render hits as the observation handed back to the model.
pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for '{}'.", query);
    }

    let mut out = format!("Search results for '{}':\n", query);
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "\n--- SOURCE {}: {} ---\nURL: {}\n\n{}\n",
            i + 1,
            hit.title,
            hit.url,
            hit.description
        ));
    }
    out
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' parameter".to_string()))?;

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).min(self.max_results))
            .unwrap_or(self.max_results);

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| ToolError::Execution(format!("Search failed: {}", e)))?;

        let hits: Vec<SearchHit> = response
            .data
            .iter()
            .map(|r| SearchHit {
                title: r.title.clone(),
                url: r.url.clone(),
                description: r.description.clone(),
            })
            .collect();
        let hits = dedup_hits(hits);

        tracing::debug!(query = %query, hits = hits.len(), "web search complete");
        Ok(Value::String(format_hits(query, &hits)))
    }
}
