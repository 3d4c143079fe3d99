//! Mock implementations for testing.
//!
//! `ScriptedLLM` routes every request to a handler based on what the request
//! is for (scoping, planning, worker step, compression, report) so a whole
//! research run can be driven without a provider.

use async_trait::async_trait;
use delve::llm::{LLMClient, LLMRequest, LLMResponse};
use delve::tools::{Tool, ToolError};
use delve::types::{AppError, MessageRole, Result, ToolCall};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a request was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Clarify,
    Brief,
    Supervisor,
    Worker,
    Compress,
    Report,
}

impl CallKind {
    pub fn of(request: &LLMRequest) -> Self {
        if let Some(schema) = &request.schema {
            return match schema.name.as_str() {
                "clarify_with_user" => CallKind::Clarify,
                "research_brief" => CallKind::Brief,
                _ => CallKind::Report,
            };
        }
        if request.has_tool("conduct_research") {
            CallKind::Supervisor
        } else if request.tools.is_empty() {
            CallKind::Compress
        } else {
            CallKind::Worker
        }
    }
}

type Handler = dyn Fn(CallKind, &LLMRequest) -> Result<LLMResponse> + Send + Sync;
type Delay = dyn Fn(CallKind, &LLMRequest) -> Option<Duration> + Send + Sync;

/// LLM double driven by a routing closure.
pub struct ScriptedLLM {
    handler: Box<Handler>,
    delay: Box<Delay>,
    calls: Mutex<HashMap<CallKind, usize>>,
    workers_in_flight: AtomicUsize,
    max_workers_in_flight: AtomicUsize,
}

impl ScriptedLLM {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(CallKind, &LLMRequest) -> Result<LLMResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Box::new(|_, _| None),
            calls: Mutex::new(HashMap::new()),
            workers_in_flight: AtomicUsize::new(0),
            max_workers_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering requests the closure picks.
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(CallKind, &LLMRequest) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self, kind: CallKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Highest number of worker requests that were awaiting a reply at once.
    pub fn max_workers_in_flight(&self) -> usize {
        self.max_workers_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let kind = CallKind::of(request);
        *self.calls.lock().entry(kind).or_insert(0) += 1;

        if kind == CallKind::Worker {
            let now = self.workers_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_workers_in_flight.fetch_max(now, Ordering::SeqCst);
        }

        if let Some(delay) = (self.delay)(kind, request) {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        let response = (self.handler)(kind, request);

        if kind == CallKind::Worker {
            self.workers_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        response
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ============= Request helpers =============

/// Task text a worker was started with (its first user message).
pub fn worker_task(request: &LLMRequest) -> String {
    request
        .messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// Number of planning turns already answered in a supervisor request.
pub fn supervisor_round(request: &LLMRequest) -> usize {
    request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count()
        + 1
}

/// Key areas listed in a report prompt.
pub fn report_key_areas(request: &LLMRequest) -> Vec<String> {
    request
        .last_content()
        .lines()
        .find_map(|line| line.strip_prefix("Key areas: "))
        .map(|areas| {
            areas
                .split("; ")
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ============= Response builders =============

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

pub fn json_reply(value: Value) -> Result<LLMResponse> {
    Ok(LLMResponse::text(value.to_string()))
}

pub fn no_clarification() -> Result<LLMResponse> {
    json_reply(json!({
        "need_clarification": false,
        "question": "",
        "verification": "Understood, starting research."
    }))
}

pub fn brief(topic: &str, key_areas: &[&str], depth: &str) -> Result<LLMResponse> {
    json_reply(json!({
        "research_brief": topic,
        "key_areas": key_areas,
        "research_depth": depth
    }))
}

/// One `conduct_research` call per topic.
pub fn delegate(round: usize, topics: &[&str]) -> Result<LLMResponse> {
    Ok(LLMResponse::tool_calls(
        topics
            .iter()
            .enumerate()
            .map(|(i, topic)| {
                call(
                    &format!("call_{}_{}", round, i),
                    "conduct_research",
                    json!({ "research_topic": topic }),
                )
            })
            .collect(),
    ))
}

pub fn research_complete() -> Result<LLMResponse> {
    Ok(LLMResponse::tool_calls(vec![call(
        "call_done",
        "research_complete",
        json!({}),
    )]))
}

/// A report with one section per key area found in the prompt.
pub fn report_for(request: &LLMRequest) -> Result<LLMResponse> {
    let sections: Vec<Value> = report_key_areas(request)
        .iter()
        .map(|area| json!({ "heading": area, "content": format!("Findings on {}.", area) }))
        .collect();
    json_reply(json!({
        "title": "Research Report",
        "sections": sections,
        "key_insights": ["See sections"],
        "citations": [],
        "caveats": []
    }))
}

/// Worker reply: reflect once, then answer.
pub fn worker_reply(request: &LLMRequest) -> Result<LLMResponse> {
    let task = worker_task(request);
    if request.messages.len() <= 2 {
        return Ok(LLMResponse::tool_calls(vec![call(
            "call_think",
            "think",
            json!({ "reflection": format!("planning {}", task) }),
        )]));
    }
    Ok(LLMResponse::text(format!("Finding: {}", task)))
}

pub fn provider_down() -> Result<LLMResponse> {
    Err(AppError::LLM("Provider returned 503: overloaded".to_string()))
}

// ============= Tools =============

/// Tool that always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "flaky_search"
    }

    fn description(&self) -> &str {
        "A search backend that is always down"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, _args: Value) -> std::result::Result<Value, ToolError> {
        Err(ToolError::Execution("backend unavailable".to_string()))
    }
}
