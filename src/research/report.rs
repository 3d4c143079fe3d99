//! Report phase: one structured model call over the whole note set.

use crate::llm::{LlmGateway, StructuredOutput};
use crate::research::prompts;
use crate::research::state::{Note, ResearchBrief};
use crate::types::{AppError, ChatMessage, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Added whenever a subtask failed or nothing was found.
pub const LIMITED_FINDINGS_CAVEAT: &str =
    "Limited findings: some research tasks failed or returned nothing, so parts of this report may be incomplete.";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
}

/// The final research artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Report {
    pub title: String,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub caveats: Vec<String>,
}

impl StructuredOutput for Report {
    const NAME: &'static str = "final_report";

    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.sections.is_empty() {
            return Err("report must have at least one section".to_string());
        }
        if self.sections.iter().any(|s| s.heading.trim().is_empty()) {
            return Err("every section needs a heading".to_string());
        }
        if self.citations.iter().any(|c| c.url.trim().is_empty()) {
            return Err("every citation needs a url".to_string());
        }
        Ok(())
    }
}

impl Report {
    /// Render as markdown; this is what ends up in `final_report`.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);

        if !self.key_insights.is_empty() {
            out.push_str("\n## Key Insights\n\n");
            for insight in &self.key_insights {
                out.push_str(&format!("- {}\n", insight));
            }
        }

        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.content.trim()));
        }

        if !self.caveats.is_empty() {
            out.push_str("\n## Caveats\n\n");
            for caveat in &self.caveats {
                out.push_str(&format!("- {}\n", caveat));
            }
        }

        if !self.citations.is_empty() {
            out.push_str("\n## Sources\n\n");
            for (i, citation) in self.citations.iter().enumerate() {
                match &citation.title {
                    Some(title) => out.push_str(&format!("{}. [{}]({})\n", i + 1, title, citation.url)),
                    None => out.push_str(&format!("{}. {}\n", i + 1, citation.url)),
                }
            }
        }

        out
    }
}

/// Every http(s) URL mentioned in the notes, in order of first appearance.
pub fn extract_urls(notes: &[Note]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for note in notes {
        for token in note.content.split_whitespace() {
            let Some(start) = token.find("http://").or_else(|| token.find("https://")) else {
                continue;
            };
            let url = token[start..].trim_end_matches(|c: char| {
                matches!(c, ')' | ']' | '>' | '.' | ',' | ';' | ':' | '"' | '\'' | '*')
            });
            if url.len() > "https://".len() && seen.insert(normalize_url(url)) {
                urls.push(url.to_string());
            }
        }
    }

    urls
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Model citations first, then URLs from the notes; deduplicated by URL.
pub fn merge_citations(model: Vec<Citation>, note_urls: Vec<String>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    model
        .into_iter()
        .chain(note_urls.into_iter().map(|url| Citation { title: None, url }))
        .filter(|c| seen.insert(normalize_url(&c.url)))
        .collect()
}

pub struct ReportCompiler {
    gateway: LlmGateway,
}

impl ReportCompiler {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }

    pub async fn compile(&self, brief: &ResearchBrief, notes: &[Note], failed_subtasks: usize) -> Result<Report> {
        let findings = if notes.is_empty() {
            "(no findings were collected)".to_string()
        } else {
            notes
                .iter()
                .map(|n| format!("[{}]\n{}", n.subtask_id, n.content))
                .collect::<Vec<_>>()
                .join("\n\n---\n\n")
        };

        let mut report: Report = self
            .gateway
            .structured(vec![ChatMessage::user(prompts::report_prompt(
                brief,
                &findings,
                failed_subtasks,
            ))])
            .await
            .map_err(|e| AppError::Report(e.to_string()))?;

        report.citations = merge_citations(std::mem::take(&mut report.citations), extract_urls(notes));

        if (failed_subtasks > 0 || notes.is_empty())
            && !report.caveats.iter().any(|c| c == LIMITED_FINDINGS_CAVEAT)
        {
            report.caveats.push(LIMITED_FINDINGS_CAVEAT.to_string());
        }

        tracing::info!(
            sections = report.sections.len(),
            citations = report.citations.len(),
            "Report compiled"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(content: &str) -> Note {
        Note {
            subtask_id: "r1-t0".to_string(),
            round: 1,
            content: content.to_string(),
        }
    }

    fn report() -> Report {
        Report {
            title: "EV vs ICE manufacturing emissions (2023)".to_string(),
            sections: vec![
                ReportSection {
                    heading: "EV battery production emissions".to_string(),
                    content: "Battery production adds 60-100 kg CO2e per kWh.".to_string(),
                },
                ReportSection {
                    heading: "ICE manufacturing emissions".to_string(),
                    content: "Roughly 6-7 t CO2e per vehicle.".to_string(),
                },
            ],
            key_insights: vec!["EVs start with a higher manufacturing debt".to_string()],
            citations: vec![Citation {
                title: Some("IEA Global EV Outlook".to_string()),
                url: "https://www.iea.org/reports/global-ev-outlook-2023".to_string(),
            }],
            caveats: vec![],
        }
    }

    #[test]
    fn test_report_roundtrips_through_validator() {
        let original = report();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_validation_rejects_empty_sections() {
        let mut r = report();
        r.sections.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_markdown_rendering() {
        let md = report().to_markdown();
        assert!(md.starts_with("# EV vs ICE manufacturing emissions (2023)\n"));
        assert!(md.contains("## Key Insights\n\n- EVs start"));
        assert!(md.contains("## EV battery production emissions"));
        assert!(md.contains("1. [IEA Global EV Outlook](https://www.iea.org/reports/global-ev-outlook-2023)"));
        assert!(!md.contains("## Caveats"));
    }

    #[test]
    fn test_extract_urls_from_notes() {
        let notes = vec![
            note("See (https://a.example/report). Also https://b.example/x,"),
            note("Repeat: https://a.example/report/ and URL: http://c.example"),
        ];
        assert_eq!(
            extract_urls(&notes),
            vec![
                "https://a.example/report".to_string(),
                "https://b.example/x".to_string(),
                "http://c.example".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_citations_model_first() {
        let merged = merge_citations(
            vec![Citation {
                title: Some("A".to_string()),
                url: "https://a.example/".to_string(),
            }],
            vec!["https://a.example".to_string(), "https://b.example".to_string()],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title.as_deref(), Some("A"));
        assert_eq!(merged[1].url, "https://b.example");
    }
}
