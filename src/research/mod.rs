//! Multi-Agent Research Orchestration
//!
//! A run moves through three phases, driven by the
//! [`orchestrator::Orchestrator`] state machine:
//!
//! 1. **Scoping** ([`scoping`]) - ask one clarifying question if needed, then
//!    synthesize a [`state::ResearchBrief`]
//! 2. **Research** ([`supervisor`]) - rounds of delegated subtasks, each run by
//!    a [`researcher::Researcher`] worker in a bounded concurrent pool
//! 3. **Reporting** ([`report`]) - one structured call over all notes
//!
//! # Usage
//!
//! ```ignore
//! use delve::research::orchestrator::{Orchestrator, RunOutcome};
//!
//! let orchestrator = Orchestrator::new(config, llm, tools, store)?;
//!
//! match orchestrator.run("thread-1", "Compare EV and ICE manufacturing emissions").await? {
//!     RunOutcome::NeedsClarification { question, .. } => println!("{}", question),
//!     RunOutcome::Completed { report, .. } => println!("{}", report.to_markdown()),
//!     RunOutcome::Failed { reason, .. } => eprintln!("{}", reason),
//!     RunOutcome::Cancelled { .. } => {}
//! }
//! ```

/// Progress events.
pub mod events;
/// Phase state machine and run entry points.
pub mod orchestrator;
/// Prompt templates.
pub mod prompts;
/// Final report compilation.
pub mod report;
/// Researcher worker loop.
pub mod researcher;
/// Intent clarification and brief synthesis.
pub mod scoping;
/// Research state types.
pub mod state;
/// Round planning and bounded dispatch.
pub mod supervisor;

use crate::types::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless the run is cancelled or `limit` elapses first.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = tokio::time::timeout(limit, fut) => {
            result.unwrap_or_else(|_| Err(AppError::Timeout(limit)))
        }
    }
}
