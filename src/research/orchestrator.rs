//! Phase orchestrator
//!
//! Drives `Idle -> Scoping -> (AwaitingClarification | Researching) ->
//! Reporting -> Complete`, with `Error` and `Cancelled` reachable from any
//! non-terminal phase. The orchestrator is the only writer of
//! [`ResearchState`]; phases hand back deltas that it applies.

use crate::llm::{LLMClient, LlmGateway};
use crate::memory::StateStore;
use crate::research::events::{EventSink, ResearchEvent};
use crate::research::guarded;
use crate::research::report::{Report, ReportCompiler};
use crate::research::researcher::Researcher;
use crate::research::scoping::{Scoper, ScopingResult};
use crate::research::state::ResearchState;
use crate::research::supervisor::{SupervisionEnd, Supervisor, SupervisorLimits};
use crate::tools::ToolRegistry;
use crate::types::{AppError, ChatMessage, Result};
use crate::utils::toml_config::ResearchConfig;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Scoping,
    AwaitingClarification,
    Researching,
    Reporting,
    Complete,
    Error,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::AwaitingClarification | RunPhase::Complete | RunPhase::Error | RunPhase::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Idle, Scoping)
                | (Scoping, AwaitingClarification)
                | (Scoping, Researching)
                | (Researching, Reporting)
                | (Reporting, Complete)
                | (_, Error)
                | (_, Cancelled)
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Scoping => "scoping",
            RunPhase::AwaitingClarification => "awaiting_clarification",
            RunPhase::Researching => "researching",
            RunPhase::Reporting => "reporting",
            RunPhase::Complete => "complete",
            RunPhase::Error => "error",
            RunPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of one orchestrator invocation. Every variant carries the
/// resulting (or last stable) state.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    NeedsClarification { question: String, state: ResearchState },
    Completed { report: Report, state: ResearchState },
    Failed { reason: String, state: ResearchState },
    Cancelled { state: ResearchState },
}

impl RunOutcome {
    pub fn state(&self) -> &ResearchState {
        match self {
            RunOutcome::NeedsClarification { state, .. }
            | RunOutcome::Completed { state, .. }
            | RunOutcome::Failed { state, .. }
            | RunOutcome::Cancelled { state } => state,
        }
    }

    pub fn phase(&self) -> RunPhase {
        match self {
            RunOutcome::NeedsClarification { .. } => RunPhase::AwaitingClarification,
            RunOutcome::Completed { .. } => RunPhase::Complete,
            RunOutcome::Failed { .. } => RunPhase::Error,
            RunOutcome::Cancelled { .. } => RunPhase::Cancelled,
        }
    }
}

struct PhaseTracker<'a> {
    thread_id: &'a str,
    phase: RunPhase,
    events: &'a EventSink,
}

impl PhaseTracker<'_> {
    fn advance(&mut self, next: RunPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::error!(thread = %self.thread_id, from = %self.phase, to = %next, "Invalid phase transition");
        }
        tracing::info!(thread = %self.thread_id, from = %self.phase, to = %next, "Phase transition");
        self.events.emit(ResearchEvent::PhaseChanged {
            from: self.phase,
            to: next,
        });
        self.phase = next;
    }
}

pub struct Orchestrator {
    config: ResearchConfig,
    scoper: Scoper,
    supervisor: Supervisor,
    reporter: ReportCompiler,
    store: Arc<dyn StateStore>,
}

impl Orchestrator {
    pub fn new(
        config: ResearchConfig,
        llm: Arc<dyn LLMClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        config.validate()?;

        let gateway = LlmGateway::new(llm);
        let researcher = Arc::new(Researcher::new(
            gateway.clone(),
            tools,
            config.max_worker_steps,
            config.compress_findings,
            config.worker_timeout(),
        ));
        let supervisor = Supervisor::new(
            gateway.clone(),
            researcher,
            SupervisorLimits {
                max_concurrent: config.max_concurrent_researchers,
                max_iterations: config.max_researcher_iterations,
                round_timeout: config.round_timeout(),
            },
        );

        Ok(Self {
            scoper: Scoper::new(gateway.clone(), config.default_depth, config.allow_clarification),
            supervisor,
            reporter: ReportCompiler::new(gateway),
            store,
            config,
        })
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run one user turn to a terminal phase.
    pub async fn run(&self, thread_id: &str, message: &str) -> Result<RunOutcome> {
        self.run_with(thread_id, message, CancellationToken::new(), EventSink::disabled())
            .await
    }

    /// Run one user turn with an explicit cancel token and event sink.
    ///
    /// `Err` is reserved for persistence failures; every other ending is a
    /// [`RunOutcome`].
    pub async fn run_with(
        &self,
        thread_id: &str,
        message: &str,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Result<RunOutcome> {
        let mut state = match self.store.load(thread_id).await? {
            Some(saved) if !saved.is_complete() => {
                tracing::info!(thread = %thread_id, "Resuming thread after clarification");
                saved
            }
            _ => ResearchState::new(thread_id),
        };
        state.push_message(ChatMessage::user(message));

        let mut phase = PhaseTracker {
            thread_id,
            phase: RunPhase::Idle,
            events: &events,
        };

        // Scoping
        phase.advance(RunPhase::Scoping);
        events.status("Analyzing research request...");

        let scoped = guarded(&cancel, self.config.scoping_timeout(), self.scoper.scope(&state)).await;
        let brief = match scoped {
            Ok(ScopingResult::NeedsClarification(question)) => {
                state.push_message(ChatMessage::assistant(question.clone(), Vec::new()));
                state.clarification_asked = true;
                phase.advance(RunPhase::AwaitingClarification);
                self.store.save(&state).await?;
                events.emit(ResearchEvent::Clarification {
                    question: question.clone(),
                });
                return Ok(RunOutcome::NeedsClarification { question, state });
            }
            Ok(ScopingResult::BriefReady { brief, verification }) => {
                if let Some(ack) = verification {
                    state.push_message(ChatMessage::assistant(ack, Vec::new()));
                }
                if state.research_brief.is_none() {
                    state.attach_brief(brief.clone())?;
                }
                events.status(format!("Research brief generated. Depth: {}", brief.depth));
                brief
            }
            Err(AppError::Cancelled) => return Ok(self.cancelled(state, &mut phase)),
            Err(e) => return Ok(self.failed(state, &mut phase, AppError::Scoping(strip_scoping(e)))),
        };

        // Research
        phase.advance(RunPhase::Researching);
        events.status(format!("Researching {} key areas...", brief.key_areas.len()));

        let supervised = self.supervisor.supervise(&brief, &state, &cancel, &events).await;
        state.notes.extend(supervised.notes);
        state.raw_notes.extend(supervised.raw_notes);
        state.iteration_count = supervised.iterations;

        if supervised.end == SupervisionEnd::Cancelled {
            return Ok(self.cancelled(state, &mut phase));
        }
        tracing::info!(
            thread = %thread_id,
            end = ?supervised.end,
            iterations = state.iteration_count,
            notes = state.notes.len(),
            failed = supervised.failed_subtasks,
            "Supervision finished"
        );

        // Reporting
        phase.advance(RunPhase::Reporting);
        events.status("Compiling final report...");

        let compiled = guarded(
            &cancel,
            self.config.report_timeout(),
            self.reporter.compile(&brief, &state.notes, supervised.failed_subtasks),
        )
        .await;

        let report = match compiled {
            Ok(report) => report,
            Err(AppError::Cancelled) => return Ok(self.cancelled(state, &mut phase)),
            Err(AppError::Report(reason)) => return Ok(self.failed(state, &mut phase, AppError::Report(reason))),
            Err(e) => return Ok(self.failed(state, &mut phase, AppError::Report(e.to_string()))),
        };

        state.finalize(report.to_markdown())?;
        phase.advance(RunPhase::Complete);
        self.store.delete(thread_id).await?;
        events.emit(ResearchEvent::ReportReady { report: report.clone() });

        Ok(RunOutcome::Completed { report, state })
    }

    /// Run one user turn in the background, streaming its events.
    ///
    /// The stream ends after the run's terminal event. Dropping the stream
    /// cancels the run.
    pub fn run_stream(
        self: Arc<Self>,
        thread_id: impl Into<String>,
        message: impl Into<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ResearchEvent> + Send + 'static {
        let thread_id = thread_id.into();
        let message = message.into();

        async_stream::stream! {
            let _guard = cancel.clone().drop_guard();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let sink = EventSink::new(tx);

            let this = self.clone();
            let run_cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                this.run_with(&thread_id, &message, run_cancel, sink).await
            });

            let mut terminated = false;
            while let Some(event) = rx.recv().await {
                terminated |= event.is_terminal();
                yield event;
            }

            let failure = match handle.await {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("Run task failed: {}", e)),
            };
            if let Some(reason) = failure {
                if !terminated {
                    yield ResearchEvent::Failed { reason };
                }
            }
        }
    }

    fn failed(&self, mut state: ResearchState, phase: &mut PhaseTracker<'_>, error: AppError) -> RunOutcome {
        let reason = error.to_string();
        tracing::error!(thread = %state.thread_id, phase = %phase.phase, error = %reason, "Run failed");
        phase.advance(RunPhase::Error);
        phase.events.emit(ResearchEvent::Failed {
            reason: reason.clone(),
        });
        state.updated_at = chrono::Utc::now();
        RunOutcome::Failed { reason, state }
    }

    fn cancelled(&self, state: ResearchState, phase: &mut PhaseTracker<'_>) -> RunOutcome {
        tracing::info!(thread = %state.thread_id, phase = %phase.phase, "Run cancelled");
        phase.advance(RunPhase::Cancelled);
        phase.events.emit(ResearchEvent::Cancelled);
        RunOutcome::Cancelled { state }
    }
}

/// Avoid "Scoping failed: Scoping failed: ..." when the scoper already tagged the error.
fn strip_scoping(error: AppError) -> String {
    match error {
        AppError::Scoping(reason) => reason,
        other => other.to_string(),
    }
}
