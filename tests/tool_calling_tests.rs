//! Integration tests for tool calling
//!
//! Covers the registry surface workers see (definitions, hint filtering,
//! failure wrapping) and a researcher worker driving tools through a
//! scripted model.

mod common;

use common::mocks::*;
use delve::llm::LlmGateway;
use delve::research::researcher::Researcher;
use delve::research::state::{Subtask, SubtaskStatus};
use delve::tools::think::ThinkTool;
use delve::tools::{ToolRegistry, THINK_TOOL};
use delve::types::{MessageRole, ToolCall};
use delve::LLMResponse;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn default_registry(root: &std::path::Path) -> ToolRegistry {
    ToolRegistry::with_default_tools(root.to_path_buf(), 3)
}

#[test]
fn test_tool_definitions_schema() {
    let dir = tempfile::tempdir().unwrap();
    let definitions = default_registry(dir.path()).get_tool_definitions();

    let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
    for expected in ["calculator", "list_files", "read_file", THINK_TOOL, "web_search"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }

    for def in &definitions {
        assert!(!def.description.is_empty(), "{} has no description", def.name);
        assert_eq!(def.parameters["type"], "object");
        assert!(def.parameters.get("properties").is_some());
    }
}

#[test]
fn test_analysis_subtask_hints_select_local_tools() {
    let dir = tempfile::tempdir().unwrap();
    let registry = default_registry(dir.path());
    let analysis = Subtask::analysis(1, 0, "Compute the emissions ratio");

    let names: Vec<String> = registry
        .get_tool_definitions_for(&analysis.tool_hints)
        .into_iter()
        .map(|d| d.name)
        .collect();

    assert!(names.contains(&"calculator".to_string()));
    assert!(names.contains(&THINK_TOOL.to_string()));
    assert!(!names.contains(&"web_search".to_string()));
}

#[tokio::test]
async fn test_file_tools_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "EV batteries: 60-100 kg CO2e/kWh").unwrap();
    let registry = default_registry(dir.path());

    let listing = registry.call("list_files", json!({})).await.unwrap();
    assert!(listing.as_str().unwrap().contains("- notes.md"));

    let content = registry
        .call("read_file", json!({"path": "notes.md"}))
        .await
        .unwrap();
    assert!(content.as_str().unwrap().contains("60-100 kg"));

    let escaped = registry
        .call("read_file", json!({"path": "../../etc/passwd"}))
        .await;
    assert!(escaped.is_err());
}

#[tokio::test]
async fn test_failed_call_becomes_observation() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FailingTool));

    let result = registry
        .execute_call(&ToolCall {
            id: "call_1".to_string(),
            name: "flaky_search".to_string(),
            arguments: json!({"query": "ICE emissions"}),
        })
        .await;

    assert!(!result.is_success());
    assert_eq!(
        result.to_observation(),
        "Tool error (flaky_search): Execution failed: backend unavailable"
    );
}

fn worker_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FailingTool));
    registry.register(Arc::new(ThinkTool));
    registry.register(Arc::new(delve::tools::calculator::Calculator));
    Arc::new(registry)
}

#[tokio::test]
async fn test_worker_recovers_from_tool_failure() {
    let llm = ScriptedLLM::new(|_, request| {
        let tool_turns = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .count();
        match tool_turns {
            0 => Ok(LLMResponse::tool_calls(vec![
                call("c1", "flaky_search", json!({"query": "ICE emissions"})),
                call("c2", "calculator", json!({"operation": "multiply", "a": 6.0, "b": 7.0})),
            ])),
            _ => {
                let failure_seen = request
                    .messages
                    .iter()
                    .any(|m| m.content.contains("backend unavailable"));
                assert!(failure_seen, "tool failure was not shown to the model");
                Ok(LLMResponse::text("ICE manufacturing is roughly 42 units."))
            }
        }
    });
    let researcher = Researcher::new(
        LlmGateway::new(Arc::new(llm)),
        worker_registry(),
        4,
        false,
        Duration::from_secs(10),
    );
    let subtask = Subtask::research(1, 0, "ICE manufacturing emissions", vec![]);

    let result = researcher
        .research(&subtask, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SubtaskStatus::Done);
    assert_eq!(result.notes, vec!["ICE manufacturing is roughly 42 units.".to_string()]);
    assert_eq!(result.raw_notes.len(), 1);
    assert!(result.raw_notes[0].contains("42"));
    assert_eq!(result.steps, 2);
}

#[tokio::test]
async fn test_worker_step_cap_keeps_partial_notes() {
    let llm = ScriptedLLM::new(|_, request| {
        let step = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count();
        Ok(LLMResponse::tool_calls(vec![call(
            &format!("c{}", step),
            "calculator",
            json!({"operation": "add", "a": step as f64, "b": 1.0}),
        )]))
    });
    let researcher = Researcher::new(
        LlmGateway::new(Arc::new(llm)),
        worker_registry(),
        3,
        false,
        Duration::from_secs(10),
    );
    let subtask = Subtask::research(1, 0, "keeps calculating", vec![]);

    let result = researcher
        .research(&subtask, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, SubtaskStatus::Failed);
    assert_eq!(result.steps, 3);
    assert_eq!(result.notes.len(), 3);
    assert_eq!(result.notes, result.raw_notes);
}

#[tokio::test]
async fn test_cancelled_worker_returns_error() {
    let llm = ScriptedLLM::new(|_, _| Ok(LLMResponse::text("never seen")))
        .with_delay(|_, _| Some(Duration::from_secs(30)));
    let researcher = Researcher::new(
        LlmGateway::new(Arc::new(llm)),
        worker_registry(),
        3,
        false,
        Duration::from_secs(60),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = researcher
        .research(&Subtask::research(1, 0, "anything", vec![]), &cancel)
        .await;

    assert!(matches!(result, Err(delve::AppError::Cancelled)));
}
