//! Scoping phase: clarify intent, then synthesize a research brief.

use crate::llm::{LlmGateway, StructuredOutput};
use crate::research::prompts;
use crate::research::state::{ResearchBrief, ResearchDepth, ResearchState};
use crate::types::{buffer_string, AppError, ChatMessage, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Model decision on whether the request needs a clarifying question.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClarificationDecision {
    pub need_clarification: bool,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub verification: String,
}

impl StructuredOutput for ClarificationDecision {
    const NAME: &'static str = "clarify_with_user";

    fn validate(&self) -> std::result::Result<(), String> {
        if self.need_clarification && self.question.trim().is_empty() {
            return Err("need_clarification is true but question is empty".to_string());
        }
        Ok(())
    }
}

/// Brief as returned by the model, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BriefDraft {
    pub research_brief: String,
    #[serde(default)]
    pub key_areas: Vec<String>,
    #[serde(default)]
    pub research_depth: Option<ResearchDepth>,
}

impl StructuredOutput for BriefDraft {
    const NAME: &'static str = "research_brief";

    fn validate(&self) -> std::result::Result<(), String> {
        if self.research_brief.trim().is_empty() {
            return Err("research_brief must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopingResult {
    /// Halt the run and ask the user this question.
    NeedsClarification(String),
    /// Research can start. `verification` is the acknowledgement to show the user, if any.
    BriefReady {
        brief: ResearchBrief,
        verification: Option<String>,
    },
}

pub struct Scoper {
    gateway: LlmGateway,
    default_depth: ResearchDepth,
    allow_clarification: bool,
}

impl Scoper {
    pub fn new(gateway: LlmGateway, default_depth: ResearchDepth, allow_clarification: bool) -> Self {
        Self {
            gateway,
            default_depth,
            allow_clarification,
        }
    }

    pub async fn scope(&self, state: &ResearchState) -> Result<ScopingResult> {
        if let Some(brief) = &state.research_brief {
            tracing::debug!(thread = %state.thread_id, "Reusing existing research brief");
            return Ok(ScopingResult::BriefReady {
                brief: brief.clone(),
                verification: None,
            });
        }

        let conversation = buffer_string(&state.messages);
        let mut verification = None;

        if self.allow_clarification && !state.clarification_asked {
            let decision: ClarificationDecision = self
                .gateway
                .structured(vec![ChatMessage::user(prompts::clarify_prompt(&conversation))])
                .await
                .map_err(|e| AppError::Scoping(e.to_string()))?;

            if decision.need_clarification {
                let question = decision.question.trim().to_string();
                tracing::info!(thread = %state.thread_id, "Clarification needed");
                return Ok(ScopingResult::NeedsClarification(question));
            }

            let ack = decision.verification.trim();
            if !ack.is_empty() {
                verification = Some(ack.to_string());
            }
        }

        let draft: BriefDraft = self
            .gateway
            .structured(vec![ChatMessage::user(prompts::brief_prompt(&conversation))])
            .await
            .map_err(|e| AppError::Scoping(e.to_string()))?;

        let brief = ResearchBrief::new(
            draft.research_brief.trim(),
            draft.key_areas,
            draft.research_depth.unwrap_or(self.default_depth),
        );

        tracing::info!(
            thread = %state.thread_id,
            depth = %brief.depth,
            key_areas = brief.key_areas.len(),
            "Research brief ready"
        );

        Ok(ScopingResult::BriefReady {
            brief,
            verification,
        })
    }
}
