//! Prompt templates for every model call in a run.

use crate::research::state::{ResearchBrief, ResearchDepth, Subtask, SubtaskKind};

/// Today's date in the form used across prompts, e.g. `Sun Oct 18, 2026`.
pub fn today() -> String {
    chrono::Local::now().format("%a %b %-d, %Y").to_string()
}

pub fn depth_guidance(depth: ResearchDepth) -> &'static str {
    match depth {
        ResearchDepth::Shallow => {
            "Focus on a high-level overview only. Use 1-2 researchers at most. Prioritize speed over comprehensiveness."
        }
        ResearchDepth::Moderate => {
            "Balance depth and breadth. Use 2-3 researchers for distinct topics. Cover the main points thoroughly."
        }
        ResearchDepth::Deep => {
            "Conduct a comprehensive investigation. Use up to the maximum number of researchers. Explore all angles and gather extensive evidence."
        }
    }
}

pub fn clarify_prompt(conversation: &str) -> String {
    format!(
        r#"These are the messages exchanged so far with the user asking for a research report:
<Messages>
{conversation}
</Messages>

Today's date is {date}.

Decide whether you need to ask the user one clarifying question before starting research, or whether
the request is specific enough to research as is.

Ask only when genuinely necessary: acronyms or terms you do not understand, a topic so broad that any
report would be arbitrary, or a missing constraint that changes the whole direction of the work.
If the messages already contain a clarifying question and its answer, do not ask again.

Respond with a JSON object:
- "need_clarification": true or false
- "question": one concise clarifying question if clarification is needed, otherwise ""
- "verification": if no clarification is needed, a short acknowledgement that you understood the
  request and will start researching now, otherwise """#,
        conversation = conversation,
        date = today(),
    )
}

pub fn brief_prompt(conversation: &str) -> String {
    format!(
        r#"Turn the conversation below into a research brief that will guide a team of researchers.
<Messages>
{conversation}
</Messages>

Today's date is {date}.

Respond with a JSON object:
- "research_brief": one detailed paragraph, written in the first person from the user's perspective,
  stating exactly what must be researched. Keep every detail and constraint the user gave; do not
  invent preferences they did not express.
- "key_areas": the distinct sub-topics the research must cover, each a short noun phrase.
- "research_depth": "shallow", "moderate" or "deep" if the user indicated how thorough to be;
  omit it otherwise."#,
        conversation = conversation,
        date = today(),
    )
}

pub fn supervisor_prompt(brief: &ResearchBrief, max_concurrent: usize, max_iterations: u32) -> String {
    let key_areas = brief
        .key_areas
        .iter()
        .map(|a| format!("- {}", a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a research supervisor. Today's date is {date}.

Your job is to delegate research on the brief below by calling the "conduct_research" tool. Each call
starts one researcher on one self-contained topic. Researchers cannot see each other's work, so
every topic must be fully described on its own.

<Brief>
{topic}
</Brief>

Key areas to cover:
{key_areas}

Rules:
- At most {max_concurrent} delegations (conduct_research or delegate_analysis) per response; extra calls are skipped.
- Use "delegate_analysis" for calculations or comparisons over data already gathered.
- Use "think" to reflect on what the findings cover and what is still missing.
- Call "research_complete" as soon as the findings cover the brief. Do not keep researching for its own sake.
- You have at most {max_iterations} rounds in total.

Research depth guidance ({depth}): {guidance}"#,
        date = today(),
        topic = brief.topic,
        key_areas = key_areas,
        max_concurrent = max_concurrent,
        max_iterations = max_iterations,
        depth = brief.depth,
        guidance = depth_guidance(brief.depth),
    )
}

pub fn researcher_prompt(subtask: &Subtask, max_steps: usize) -> String {
    let role = match subtask.kind {
        SubtaskKind::Research => "a research assistant gathering evidence on one topic",
        SubtaskKind::Analysis => "a data analyst working through one analysis task",
    };

    let focus = if subtask.key_areas.is_empty() {
        String::new()
    } else {
        format!("\nFocus areas: {}\n", subtask.key_areas.join("; "))
    };

    format!(
        r#"You are {role}. Today's date is {date}.

<Task>
{description}
</Task>
{focus}
Use the available tools to gather information. After each search, use "think" to assess what you
found and what is missing. Stop as soon as you can answer confidently; you have at most {max_steps}
steps. When done, reply without any tool calls, giving your findings with the source URL for every
fact you cite."#,
        role = role,
        date = today(),
        description = subtask.description,
        focus = focus,
        max_steps = max_steps,
    )
}

pub fn compress_prompt(task: &str) -> String {
    format!(
        r#"Clean up the research transcript above into a findings summary for the task: "{task}".

Keep every relevant fact, figure and quotation verbatim. Remove repetition and irrelevant chatter.
End with a "Sources" list giving each cited URL once, numbered in order of first use."#,
        task = task,
    )
}

pub fn report_prompt(brief: &ResearchBrief, findings: &str, failed_subtasks: usize) -> String {
    let key_areas = brief.key_areas.join("; ");
    let failure_note = if failed_subtasks > 0 {
        format!(
            "\nNote: {} research task(s) failed, so some areas may be thinly covered. Say so in the caveats.\n",
            failed_subtasks
        )
    } else {
        String::new()
    };

    format!(
        r#"Write the final research report. Today's date is {date}.

<Brief>
{topic}
</Brief>
Key areas: {key_areas}

<Findings>
{findings}
</Findings>
{failure_note}
Respond with a JSON object:
- "title": the report title
- "sections": a list of {{"heading", "content"}} objects; content is markdown. Give each key area at least one section.
- "key_insights": the most important takeaways, most important first
- "citations": a list of {{"title", "url"}} for the sources you relied on
- "caveats": limitations of the evidence, if any"#,
        date = today(),
        topic = brief.topic,
        key_areas = key_areas,
        findings = findings,
        failure_note = failure_note,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> ResearchBrief {
        ResearchBrief::new(
            "Compare EV and ICE manufacturing emissions in 2023",
            vec![
                "EV battery production emissions".to_string(),
                "ICE manufacturing emissions".to_string(),
            ],
            ResearchDepth::Shallow,
        )
    }

    #[test]
    fn test_supervisor_prompt_includes_limits_and_guidance() {
        let prompt = supervisor_prompt(&brief(), 3, 10);
        assert!(prompt.contains("- EV battery production emissions"));
        assert!(prompt.contains("At most 3 delegations"));
        assert!(prompt.contains("at most 10 rounds"));
        assert!(prompt.contains("(shallow)"));
        assert!(prompt.contains("1-2 researchers"));
    }

    #[test]
    fn test_researcher_prompt_by_kind() {
        let research = Subtask::research(1, 0, "EV batteries", vec!["EV".to_string()]);
        assert!(researcher_prompt(&research, 8).contains("research assistant"));
        assert!(researcher_prompt(&research, 8).contains("Focus areas: EV"));

        let analysis = Subtask::analysis(1, 1, "compare");
        assert!(researcher_prompt(&analysis, 8).contains("data analyst"));
    }

    #[test]
    fn test_report_prompt_mentions_failures() {
        assert!(report_prompt(&brief(), "notes", 2).contains("2 research task(s) failed"));
        assert!(!report_prompt(&brief(), "notes", 0).contains("failed"));
    }
}
