//! Researcher worker: a bounded tool-use loop over one subtask.
//!
//! Workers never touch [`ResearchState`](crate::research::state::ResearchState).
//! They own their transcript and note buffer and hand a [`WorkerResult`] back
//! to the supervisor.

use crate::llm::{GatewayOutput, LlmGateway};
use crate::research::prompts;
use crate::research::state::{Subtask, SubtaskStatus};
use crate::tools::{ToolRegistry, THINK_TOOL};
use crate::types::{AppError, ChatMessage, Result, ToolDefinition};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub subtask_id: String,
    /// Findings handed to the supervisor.
    pub notes: Vec<String>,
    /// Successful tool observations, unprocessed.
    pub raw_notes: Vec<String>,
    pub status: SubtaskStatus,
    /// Model calls made by the loop.
    pub steps: usize,
}

enum LoopEnd {
    Finding {
        text: String,
        transcript: Vec<ChatMessage>,
    },
    Exhausted,
}

pub struct Researcher {
    gateway: LlmGateway,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
    compress: bool,
    deadline: Duration,
}

impl Researcher {
    pub fn new(
        gateway: LlmGateway,
        tools: Arc<ToolRegistry>,
        max_steps: usize,
        compress: bool,
        deadline: Duration,
    ) -> Self {
        Self {
            gateway,
            tools,
            max_steps,
            compress,
            deadline,
        }
    }

    /// Run one subtask to a finding or to failure.
    ///
    /// Only cancellation is returned as an error; model, tool and timeout
    /// failures all end in a `Failed` result carrying partial notes.
    pub async fn research(&self, subtask: &Subtask, cancel: &CancellationToken) -> Result<WorkerResult> {
        let mut raw = Vec::new();
        let mut steps = 0usize;

        let ended = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            ended = tokio::time::timeout(self.deadline, self.run_loop(subtask, &mut raw, &mut steps)) => ended,
        };

        let (status, notes) = match ended {
            Ok(LoopEnd::Finding { text, transcript }) => {
                let finding = if self.compress {
                    self.compress_finding(subtask, transcript, text).await
                } else {
                    text
                };
                (SubtaskStatus::Done, vec![finding])
            }
            Ok(LoopEnd::Exhausted) => {
                tracing::warn!(subtask = %subtask.id, steps, "Worker hit step cap without a finding");
                (SubtaskStatus::Failed, raw.clone())
            }
            Err(_) => {
                tracing::warn!(subtask = %subtask.id, deadline = ?self.deadline, "Worker deadline reached");
                (SubtaskStatus::Failed, raw.clone())
            }
        };

        tracing::info!(subtask = %subtask.id, ?status, steps, notes = notes.len(), "Worker finished");

        Ok(WorkerResult {
            subtask_id: subtask.id.clone(),
            notes,
            raw_notes: raw,
            status,
            steps,
        })
    }

    async fn run_loop(&self, subtask: &Subtask, raw: &mut Vec<String>, steps: &mut usize) -> LoopEnd {
        let tools: Vec<ToolDefinition> = self.tools.get_tool_definitions_for(&subtask.tool_hints);
        let mut transcript = vec![
            ChatMessage::system(prompts::researcher_prompt(subtask, self.max_steps)),
            ChatMessage::user(subtask.description.clone()),
        ];

        while *steps < self.max_steps {
            *steps += 1;

            match self
                .gateway
                .invoke(transcript.clone(), None, tools.clone())
                .await
            {
                Ok(GatewayOutput::ToolRequest { content, calls }) => {
                    transcript.push(ChatMessage::assistant(content, calls.clone()));

                    let results = join_all(calls.iter().map(|call| self.tools.execute_call(call))).await;
                    for result in results {
                        let observation = result.to_observation();
                        if result.is_success() && result.name != THINK_TOOL {
                            raw.push(observation.clone());
                        }
                        transcript.push(ChatMessage::tool_result(result.tool_call_id, observation));
                    }
                }
                Ok(GatewayOutput::Text(text)) => {
                    if text.trim().is_empty() {
                        transcript.push(ChatMessage::user(
                            "Your reply was empty. Continue researching or give your findings.",
                        ));
                        continue;
                    }
                    transcript.push(ChatMessage::assistant(text.clone(), Vec::new()));
                    return LoopEnd::Finding { text, transcript };
                }
                Ok(GatewayOutput::Structured(value)) => {
                    let text = value.to_string();
                    return LoopEnd::Finding { text, transcript };
                }
                Err(e) => {
                    tracing::warn!(subtask = %subtask.id, error = %e, "Model call failed inside worker");
                    transcript.push(ChatMessage::user(format!("model error: {}", e)));
                }
            }
        }

        LoopEnd::Exhausted
    }

    async fn compress_finding(&self, subtask: &Subtask, mut transcript: Vec<ChatMessage>, finding: String) -> String {
        transcript.push(ChatMessage::user(prompts::compress_prompt(&subtask.description)));

        match self.gateway.text(transcript).await {
            Ok(compressed) if !compressed.trim().is_empty() => compressed,
            Ok(_) => finding,
            Err(e) => {
                tracing::warn!(subtask = %subtask.id, error = %e, "Compression failed, keeping raw finding");
                finding
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMClient, LLMRequest, LLMResponse};
    use crate::types::ToolCall;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Answers tool-bound requests from a queue; unbound requests are compression.
    struct Script {
        turns: Mutex<Vec<Result<LLMResponse>>>,
        compress: Result<String>,
        calls: Mutex<usize>,
    }

    impl Script {
        fn new(turns: Vec<Result<LLMResponse>>, compress: Result<String>) -> Arc<Self> {
            let mut turns = turns;
            turns.reverse();
            Arc::new(Self {
                turns: Mutex::new(turns),
                compress,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMClient for Script {
        async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
            *self.calls.lock() += 1;
            if request.tools.is_empty() {
                return match &self.compress {
                    Ok(text) => Ok(LLMResponse::text(text.clone())),
                    Err(e) => Err(AppError::LLM(e.to_string())),
                };
            }
            self.turns
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(LLMResponse::tool_calls(vec![think_call("again")])))
        }

        fn model_name(&self) -> &str {
            "script"
        }
    }

    fn think_call(reflection: &str) -> ToolCall {
        ToolCall {
            id: format!("think-{}", reflection),
            name: THINK_TOOL.to_string(),
            arguments: json!({"reflection": reflection}),
        }
    }

    fn calc_call() -> ToolCall {
        ToolCall {
            id: "calc".to_string(),
            name: "calculator".to_string(),
            arguments: json!({"operation": "multiply", "a": 6.0, "b": 7.0}),
        }
    }

    fn researcher(client: Arc<Script>, compress: bool, max_steps: usize) -> Researcher {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(crate::tools::calculator::Calculator));
        tools.register(Arc::new(crate::tools::think::ThinkTool));
        Researcher::new(
            LlmGateway::new(client),
            Arc::new(tools),
            max_steps,
            compress,
            Duration::from_secs(5),
        )
    }

    fn subtask() -> Subtask {
        Subtask::research(1, 0, "Multiply six by seven", vec![])
    }

    #[tokio::test]
    async fn test_finding_after_tool_use() {
        let client = Script::new(
            vec![
                Ok(LLMResponse::tool_calls(vec![calc_call(), think_call("done")])),
                Ok(LLMResponse::text("The answer is 42.")),
            ],
            Ok("unused".to_string()),
        );
        let result = researcher(client, false, 5)
            .research(&subtask(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, SubtaskStatus::Done);
        assert_eq!(result.notes, vec!["The answer is 42.".to_string()]);
        assert_eq!(result.raw_notes.len(), 1);
        assert!(result.raw_notes[0].contains("42"));
        assert_eq!(result.steps, 2);
    }

    #[tokio::test]
    async fn test_compression_replaces_finding() {
        let client = Script::new(
            vec![Ok(LLMResponse::text("raw finding"))],
            Ok("clean finding".to_string()),
        );
        let result = researcher(client, true, 5)
            .research(&subtask(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.notes, vec!["clean finding".to_string()]);
    }

    #[tokio::test]
    async fn test_compression_failure_keeps_raw_finding() {
        let client = Script::new(
            vec![Ok(LLMResponse::text("raw finding"))],
            Err(AppError::LLM("down".to_string())),
        );
        let result = researcher(client, true, 5)
            .research(&subtask(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.notes, vec!["raw finding".to_string()]);
    }

    #[tokio::test]
    async fn test_step_cap_yields_failed_with_partial_notes() {
        let client = Script::new(vec![Ok(LLMResponse::tool_calls(vec![calc_call()]))], Ok(String::new()));
        let result = researcher(client.clone(), false, 3)
            .research(&subtask(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, SubtaskStatus::Failed);
        assert_eq!(result.steps, 3);
        assert_eq!(result.notes.len(), 1);
        assert_eq!(*client.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_model_errors_become_observations() {
        let client = Script::new(
            vec![
                Err(AppError::LLM("rate limited".to_string())),
                Ok(LLMResponse::text("recovered")),
            ],
            Ok(String::new()),
        );
        let result = researcher(client, false, 5)
            .research(&subtask(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status, SubtaskStatus::Done);
        assert_eq!(result.steps, 2);
    }

    #[tokio::test]
    async fn test_cancelled_worker_returns_error() {
        let client = Script::new(vec![], Ok(String::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = researcher(client, false, 5).research(&subtask(), &cancel).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
