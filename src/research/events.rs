//! Progress events emitted during a run.

use crate::research::orchestrator::RunPhase;
use crate::research::report::Report;
use crate::research::state::SubtaskStatus;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    PhaseChanged { from: RunPhase, to: RunPhase },
    Status { message: String },
    RoundStarted { round: u32, subtasks: Vec<String> },
    WorkerFinished { subtask_id: String, status: SubtaskStatus },
    Clarification { question: String },
    ReportReady { report: Report },
    Failed { reason: String },
    Cancelled,
}

impl ResearchEvent {
    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchEvent::Clarification { .. }
                | ResearchEvent::ReportReady { .. }
                | ResearchEvent::Failed { .. }
                | ResearchEvent::Cancelled
        )
    }
}

/// Optional event channel. Sending never fails the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ResearchEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<ResearchEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ResearchEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ResearchEvent::Status {
            message: message.into(),
        });
    }
}
