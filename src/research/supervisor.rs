//! Supervisor: plans rounds of delegated research and merges the results.
//!
//! One round is `Planning -> Dispatching -> Awaiting -> merge`. Workers run
//! concurrently in a bounded pool; their results are put back in dispatch
//! order before anything is appended, so note order never depends on which
//! worker finished first.

use crate::llm::{GatewayOutput, LlmGateway};
use crate::research::events::{EventSink, ResearchEvent};
use crate::research::guarded;
use crate::research::prompts;
use crate::research::researcher::{Researcher, WorkerResult};
use crate::research::state::{dedup_key_areas, Note, ResearchBrief, ResearchState, Subtask, SubtaskStatus};
use crate::tools::THINK_TOOL;
use crate::types::{AppError, ChatMessage, Result, ToolCall, ToolDefinition};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const CONDUCT_RESEARCH: &str = "conduct_research";
pub const DELEGATE_ANALYSIS: &str = "delegate_analysis";
pub const RESEARCH_COMPLETE: &str = "research_complete";

/// Delegate one research topic to a researcher.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConductResearch {
    /// The topic to research, described in full. At least a paragraph.
    pub research_topic: String,
    /// Key areas of the brief this topic covers.
    #[serde(default)]
    pub key_areas: Vec<String>,
}

/// Delegate a data-analysis task (calculations, comparisons over gathered data).
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DelegateAnalysis {
    pub task_description: String,
}

/// Reflect on progress before deciding the next step.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Think {
    pub reflection: String,
}

/// Signal that the findings cover the brief.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResearchComplete {}

fn tool_definition<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let schema = schemars::schema_for!(T);
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"})),
    }
}

/// Tools bound to every planning call.
pub fn supervisor_tools() -> Vec<ToolDefinition> {
    vec![
        tool_definition::<ConductResearch>(
            CONDUCT_RESEARCH,
            "Start a researcher on one self-contained research topic",
        ),
        tool_definition::<DelegateAnalysis>(
            DELEGATE_ANALYSIS,
            "Start an analyst on a calculation or comparison task",
        ),
        tool_definition::<Think>(THINK_TOOL, "Reflect on findings so far and plan the next step"),
        tool_definition::<ResearchComplete>(
            RESEARCH_COMPLETE,
            "Finish research; the findings cover the brief",
        ),
    ]
}

/// Why supervision stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionEnd {
    /// The model judged coverage sufficient.
    CoverageSufficient,
    /// `max_researcher_iterations` rounds were run.
    IterationLimit,
    /// A round failed twice in a row.
    Aborted,
    /// The run was cancelled; the in-flight round was discarded.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SupervisionOutcome {
    /// All notes from completed rounds, in dispatch order.
    pub notes: Vec<Note>,
    pub raw_notes: Vec<Note>,
    pub iterations: u32,
    pub end: SupervisionEnd,
    pub subtasks: Vec<Subtask>,
    pub failed_subtasks: usize,
}

/// Delta produced by one completed round.
struct RoundDelta {
    assistant: ChatMessage,
    observations: Vec<ChatMessage>,
    notes: Vec<Note>,
    raw_notes: Vec<Note>,
    subtasks: Vec<Subtask>,
}

enum RoundOutcome {
    Complete,
    Ran(RoundDelta),
}

/// Supervision limits.
#[derive(Debug, Clone)]
pub struct SupervisorLimits {
    pub max_concurrent: usize,
    pub max_iterations: u32,
    pub round_timeout: Duration,
}

pub struct Supervisor {
    gateway: LlmGateway,
    researcher: Arc<Researcher>,
    limits: SupervisorLimits,
}

impl Supervisor {
    pub fn new(gateway: LlmGateway, researcher: Arc<Researcher>, limits: SupervisorLimits) -> Self {
        Self {
            gateway,
            researcher,
            limits,
        }
    }

    /// Run rounds until coverage is judged sufficient, the iteration cap is
    /// hit, a round aborts twice in a row, or the run is cancelled.
    pub async fn supervise(
        &self,
        brief: &ResearchBrief,
        state: &ResearchState,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> SupervisionOutcome {
        let mut conversation = vec![
            ChatMessage::system(prompts::supervisor_prompt(
                brief,
                self.limits.max_concurrent,
                self.limits.max_iterations,
            )),
            ChatMessage::user(format!("Research brief: {}", brief.topic)),
        ];

        let mut outcome = SupervisionOutcome {
            notes: Vec::new(),
            raw_notes: Vec::new(),
            iterations: state.iteration_count,
            end: SupervisionEnd::IterationLimit,
            subtasks: Vec::new(),
            failed_subtasks: 0,
        };
        let mut retrying = false;

        loop {
            if outcome.iterations >= self.limits.max_iterations {
                tracing::info!(iterations = outcome.iterations, "Iteration limit reached");
                events.status("Max iterations reached. Compiling report...");
                outcome.end = SupervisionEnd::IterationLimit;
                break;
            }

            let round = outcome.iterations + 1;
            events.status("Supervisor is planning research...");

            let attempt = guarded(
                cancel,
                self.limits.round_timeout,
                self.run_round(round, &conversation, cancel, events),
            )
            .await;

            match attempt {
                Ok(RoundOutcome::Complete) => {
                    tracing::info!(round, "Supervisor judged coverage sufficient");
                    events.status("Research complete. Compiling report...");
                    outcome.end = SupervisionEnd::CoverageSufficient;
                    break;
                }
                Ok(RoundOutcome::Ran(delta)) => {
                    conversation.push(delta.assistant);
                    conversation.extend(delta.observations);
                    outcome.failed_subtasks += delta
                        .subtasks
                        .iter()
                        .filter(|s| s.status == SubtaskStatus::Failed)
                        .count();
                    outcome.notes.extend(delta.notes);
                    outcome.raw_notes.extend(delta.raw_notes);
                    outcome.subtasks.extend(delta.subtasks);
                    outcome.iterations = round;
                    retrying = false;
                    tracing::info!(round, notes = outcome.notes.len(), "Round complete");
                }
                Err(AppError::Cancelled) => {
                    tracing::info!(round, "Supervision cancelled, discarding in-flight round");
                    outcome.end = SupervisionEnd::Cancelled;
                    break;
                }
                Err(e) if !retrying => {
                    tracing::warn!(round, error = %e, "Round aborted, retrying once");
                    retrying = true;
                }
                Err(e) => {
                    tracing::error!(round, error = %e, "Round aborted twice, ending supervision");
                    outcome.end = SupervisionEnd::Aborted;
                    break;
                }
            }
        }

        outcome
    }

    async fn run_round(
        &self,
        round: u32,
        conversation: &[ChatMessage],
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> Result<RoundOutcome> {
        let output = self
            .gateway
            .invoke(conversation.to_vec(), None, supervisor_tools())
            .await?;

        let (content, calls) = match output {
            GatewayOutput::ToolRequest { content, calls } => (content, calls),
            GatewayOutput::Text(_) | GatewayOutput::Structured(_) => return Ok(RoundOutcome::Complete),
        };

        if calls.iter().any(|c| c.name == RESEARCH_COMPLETE) {
            return Ok(RoundOutcome::Complete);
        }

        let (mut observations, dispatch) = self.plan(round, &calls);
        let mut subtasks: Vec<Subtask> = dispatch.iter().map(|(_, s)| s.clone()).collect();

        events.emit(ResearchEvent::RoundStarted {
            round,
            subtasks: subtasks.iter().map(|s| s.id.clone()).collect(),
        });
        tracing::info!(round, workers = subtasks.len(), "Dispatching round");

        let results = self.dispatch(&subtasks, cancel).await?;

        let mut notes = Vec::new();
        let mut raw_notes = Vec::new();
        for (((call_index, _), subtask), result) in dispatch.iter().zip(subtasks.iter_mut()).zip(results) {
            subtask.status = result.status;
            events.emit(ResearchEvent::WorkerFinished {
                subtask_id: subtask.id.clone(),
                status: result.status,
            });

            observations[*call_index] = Some(worker_observation(&result));
            notes.extend(result.notes.into_iter().map(|content| Note {
                subtask_id: subtask.id.clone(),
                round,
                content,
            }));
            raw_notes.extend(result.raw_notes.into_iter().map(|content| Note {
                subtask_id: subtask.id.clone(),
                round,
                content,
            }));
        }

        let observations = calls
            .iter()
            .zip(observations)
            .map(|(call, obs)| {
                ChatMessage::tool_result(call.id.clone(), obs.unwrap_or_else(|| "No result.".to_string()))
            })
            .collect();

        Ok(RoundOutcome::Ran(RoundDelta {
            assistant: ChatMessage::assistant(content, calls),
            observations,
            notes,
            raw_notes,
            subtasks,
        }))
    }

    /// Turn planning tool calls into subtasks plus the observations that are
    /// known without running anything. Returns one slot per call.
    fn plan(&self, round: u32, calls: &[ToolCall]) -> (Vec<Option<String>>, Vec<(usize, Subtask)>) {
        let mut observations = vec![None; calls.len()];
        let mut dispatch: Vec<(usize, Subtask)> = Vec::new();

        for (i, call) in calls.iter().enumerate() {
            match call.name.as_str() {
                CONDUCT_RESEARCH | DELEGATE_ANALYSIS => {
                    if dispatch.len() >= self.limits.max_concurrent {
                        observations[i] = Some(format!(
                            "Skipped: at most {} delegations are dispatched per round. Delegate this again later if still needed.",
                            self.limits.max_concurrent
                        ));
                        continue;
                    }
                    match parse_delegation(round, dispatch.len(), call) {
                        Ok(subtask) => dispatch.push((i, subtask)),
                        Err(reason) => {
                            observations[i] = Some(format!("Invalid delegation: {}", reason));
                        }
                    }
                }
                THINK_TOOL => {
                    let reflection = serde_json::from_value::<Think>(call.arguments.clone())
                        .map(|t| t.reflection)
                        .unwrap_or_default();
                    observations[i] = Some(format!("Reflection recorded: {}", reflection));
                }
                other => {
                    observations[i] = Some(format!("Unknown tool: {}", other));
                }
            }
        }

        (observations, dispatch)
    }

    /// Run subtasks in a bounded pool and return results in dispatch order.
    async fn dispatch(&self, subtasks: &[Subtask], cancel: &CancellationToken) -> Result<Vec<WorkerResult>> {
        let permits = Arc::new(Semaphore::new(self.limits.max_concurrent));
        let mut set = JoinSet::new();

        for (index, subtask) in subtasks.iter().enumerate() {
            let subtask = subtask.clone();
            let researcher = self.researcher.clone();
            let cancel = cancel.clone();
            let permits = permits.clone();

            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                let result = researcher.research(&subtask, &cancel).await?;
                Ok::<_, AppError>((index, result))
            });
        }

        let mut slots: Vec<Option<WorkerResult>> = vec![None; subtasks.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((index, result))) => slots[index] = Some(result),
                Ok(Err(AppError::Cancelled)) => return Err(AppError::Cancelled),
                Ok(Err(e)) => tracing::warn!(error = %e, "Worker returned an error"),
                Err(e) => tracing::error!(error = %e, "Worker task panicked"),
            }
        }

        Ok(slots
            .into_iter()
            .zip(subtasks)
            .map(|(slot, subtask)| {
                slot.unwrap_or_else(|| WorkerResult {
                    subtask_id: subtask.id.clone(),
                    notes: Vec::new(),
                    raw_notes: Vec::new(),
                    status: SubtaskStatus::Failed,
                    steps: 0,
                })
            })
            .collect())
    }
}

fn parse_delegation(round: u32, index: usize, call: &ToolCall) -> std::result::Result<Subtask, String> {
    if call.name == DELEGATE_ANALYSIS {
        let args: DelegateAnalysis =
            serde_json::from_value(call.arguments.clone()).map_err(|e| e.to_string())?;
        if args.task_description.trim().is_empty() {
            return Err("task_description must not be empty".to_string());
        }
        return Ok(Subtask::analysis(round, index, args.task_description.trim()));
    }

    let args: ConductResearch = serde_json::from_value(call.arguments.clone()).map_err(|e| e.to_string())?;
    if args.research_topic.trim().is_empty() {
        return Err("research_topic must not be empty".to_string());
    }
    Ok(Subtask::research(
        round,
        index,
        args.research_topic.trim(),
        dedup_key_areas(args.key_areas),
    ))
}

fn worker_observation(result: &WorkerResult) -> String {
    match (result.status, result.notes.is_empty()) {
        (SubtaskStatus::Failed, true) => "Research failed for this task with no findings.".to_string(),
        (SubtaskStatus::Failed, false) => format!(
            "Research failed for this task. Partial findings:\n{}",
            result.notes.join("\n\n")
        ),
        _ => result.notes.join("\n\n"),
    }
}
