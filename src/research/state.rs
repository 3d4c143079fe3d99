//! Research run state
//!
//! [`ResearchState`] is the single record threaded through a run. Phases never
//! mutate it directly: they return deltas that the orchestrator applies.

use crate::types::{AppError, ChatMessage, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How thoroughly a brief should be researched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Shallow,
    #[default]
    Moderate,
    Deep,
}

impl ResearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchDepth::Shallow => "shallow",
            ResearchDepth::Moderate => "moderate",
            ResearchDepth::Deep => "deep",
        }
    }
}

impl std::fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" => Ok(ResearchDepth::Shallow),
            "moderate" => Ok(ResearchDepth::Moderate),
            "deep" => Ok(ResearchDepth::Deep),
            other => Err(format!("unknown research depth '{}'", other)),
        }
    }
}

/// Structured research plan produced by scoping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchBrief {
    pub topic: String,
    pub key_areas: Vec<String>,
    pub depth: ResearchDepth,
}

impl ResearchBrief {
    /// Build a brief, normalizing the key areas.
    pub fn new(topic: impl Into<String>, key_areas: Vec<String>, depth: ResearchDepth) -> Self {
        Self {
            topic: topic.into(),
            key_areas: dedup_key_areas(key_areas),
            depth,
        }
    }
}

/// Trim, drop empties, and deduplicate case-insensitively keeping first occurrence.
pub fn dedup_key_areas(areas: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    areas
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_lowercase()))
        .collect()
}

/// A research finding tagged with the subtask that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub subtask_id: String,
    pub round: u32,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskKind {
    /// Open-ended research with every tool available.
    Research,
    /// Data analysis restricted to calculator, file and think tools.
    Analysis,
}

/// One unit of delegated work. Owned by the supervisor; workers get a clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    pub id: String,
    pub round: u32,
    pub description: String,
    pub kind: SubtaskKind,
    pub tool_hints: Vec<String>,
    pub key_areas: Vec<String>,
    pub status: SubtaskStatus,
}

impl Subtask {
    /// Ids are `r{round}-t{index}` so they sort in dispatch order.
    pub fn research(round: u32, index: usize, description: impl Into<String>, key_areas: Vec<String>) -> Self {
        Self {
            id: format!("r{}-t{}", round, index),
            round,
            description: description.into(),
            kind: SubtaskKind::Research,
            tool_hints: Vec::new(),
            key_areas,
            status: SubtaskStatus::Pending,
        }
    }

    pub fn analysis(round: u32, index: usize, description: impl Into<String>) -> Self {
        Self {
            kind: SubtaskKind::Analysis,
            tool_hints: vec![
                "calculator".to_string(),
                "read_file".to_string(),
                "list_files".to_string(),
            ],
            ..Self::research(round, index, description, Vec::new())
        }
    }
}

/// The mutable record threaded through every phase of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchState {
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
    pub research_brief: Option<ResearchBrief>,
    pub notes: Vec<Note>,
    #[serde(default)]
    pub raw_notes: Vec<Note>,
    pub iteration_count: u32,
    pub final_report: Option<String>,
    /// Whether a clarifying question has already been asked in this thread.
    #[serde(default)]
    pub clarification_asked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            research_brief: None,
            notes: Vec::new(),
            raw_notes: Vec::new(),
            iteration_count: 0,
            final_report: None,
            clarification_asked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Set the brief. A brief is immutable once attached.
    pub fn attach_brief(&mut self, brief: ResearchBrief) -> Result<()> {
        if self.research_brief.is_some() {
            return Err(AppError::Internal(
                "research brief is already set for this thread".to_string(),
            ));
        }
        self.research_brief = Some(brief);
        self.touch();
        Ok(())
    }

    /// Write the final report. Only ever happens once per state.
    pub fn finalize(&mut self, report: String) -> Result<()> {
        if self.final_report.is_some() {
            return Err(AppError::Internal("final report already written".to_string()));
        }
        self.push_message(ChatMessage::assistant(report.clone(), Vec::new()));
        self.final_report = Some(report);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.final_report.is_some()
    }

    /// The most recent user turn, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::MessageRole::User)
            .map(|m| m.content.as_str())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
