//! Prompt text injected into a research conversation.

/// Typographic characters replaced when ASCII prompts are enabled.
const ASCII_MAP: [(char, &str); 8] = [
    ('\u{2014}', "-"),
    ('\u{2013}', "-"),
    ('\u{2012}', "-"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2026}', "..."),
];

/// Map typographic dashes, quotes and ellipses to ASCII.
pub fn normalize_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match ASCII_MAP.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// The opening system prompt for a session.
pub fn system_prompt(query: &str, max_iterations: u32, current_year: &str) -> String {
    format!(
        "You are a senior research analyst working in a ReAct loop (reason, act, observe).

Each iteration:
1. THOUGHT \u{2013} state what you know, what is still unclear, and which source would close the gap.
2. ACTION \u{2013} call only tools that help. Default to web_search; use github_search for implementations or repositories and arxiv_search for scholarly evidence. Use pdf_to_text when a PDF is referenced.
3. OBSERVATION \u{2014} extract the decision-relevant evidence and note follow-up questions for the next THOUGHT.
4. Repeat until the topic is understood, then call `finish` immediately. Do not spend iterations \u{201C}just in case\u{201D}.

Available tools:
- web_search: news, articles, practical and timely information.
- arxiv_search: peer-reviewed and pre-print literature.
- github_search: implementations, libraries, benchmarks.
- pdf_to_text: text from PDFs found by other tools.
- finish: emit the final Deep Research Report and end the loop.

Guidelines:
- Max iterations: {max_iterations}. Batch tool calls in one action only when clearly warranted.
- Cite sources inline as [#] matching the ordered sources list.
- If a web_search returns fewer than 3 relevant results, refine the query and search again before moving on.
- When freshness matters, set date_filter (day/week/month/year). Treat the current year as {current_year} unless the user asks otherwise.
- For historical topics keep the referenced years and skip recency filters.
- Coverage reminders are hints, not quotas. Once every report section can be written, call `finish`.
- The final report needs a title, a TL;DR, methodology and evidence quality, findings tailored to the query, implementation or impact, gaps and open questions, and recommended next steps.

Current query: {query}"
    )
}

/// The user turn that starts the loop.
pub fn kickoff(query: &str) -> String {
    format!(
        "You are about to start the research process described above. \
         Restate the plan and begin reasoning about the query:\n\n{query}"
    )
}

pub const CONTINUE: &str =
    "Continue with the next action or finish if you have enough information.";

/// Placeholder assistant text when the model replied with neither text nor tools.
pub const NO_ACTION: &str = "I need to take an action.";

pub const FORCE_FINISH: &str = "You have reached the iteration limit. Using only the observations \
gathered so far, call the finish tool now and write the Deep Research Report: title, TL;DR \
(4-6 bullets), methodology and evidence quality, findings tailored to the query, implementation \
or impact, risks and open questions, and recommended next steps. Cite sources inline as [#]. \
Do NOT call any other tools.";

pub const EMPTY_REPORT: &str = "Finish rejected: the report is empty. Write the full report in \
the `report` field and list its sources before calling finish again.";

pub const GUARD_SYSTEM: &str = "You are a critical reviewer deciding if the report can finish.";

pub const GUARD_INSTRUCTIONS: &str = r#"Assess whether the draft Deep Research Report is complete, well-sourced, and ready.
Reply with strict JSON:
{
  "allow_finish": true or false,
  "feedback": "Short critique explaining readiness or missing evidence.",
  "next_action_hint": "If allow_finish=false, specify the most useful follow-up query/tool."
}
Approve only if the report covers the query, cites authoritative sources, and addresses remaining risks."#;

/// The reviewer's user turn for one draft.
pub fn guard_request(query: &str, report: &str, sources: &[String]) -> String {
    let excerpt: String = report.chars().take(4000).collect();
    let listed = if sources.is_empty() {
        "None provided".to_string()
    } else {
        sources
            .iter()
            .take(12)
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("{GUARD_INSTRUCTIONS}\n\nQuery:\n{query}\n\nDraft report:\n{excerpt}\n\nSources:\n{listed}")
}

pub fn coverage_reminder(missing: &[&str]) -> String {
    format!(
        "Optional coverage reminder: consider evidence from {} if it would materially improve \
         coverage. Use one of these tools only if justified by the query.",
        missing.join(", ")
    )
}

pub fn guard_guidance(hint: &str) -> String {
    format!("Finish guard guidance: {hint} Use the most relevant tool to close the gap.")
}

pub fn auto_finish_feedback(feedback: &str) -> String {
    format!(
        "Finish guard feedback: {feedback}. Revise the report using ONLY existing observations; \
         do not call any tools. Then call finish again."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_normalization() {
        assert_eq!(
            normalize_ascii("a \u{2014} b \u{201C}c\u{201D} d\u{2026}"),
            "a - b \"c\" d..."
        );
        assert_eq!(normalize_ascii("plain"), "plain");
    }

    #[test]
    fn system_prompt_mentions_budget_and_query() {
        let prompt = system_prompt("quantum sensors", 6, "2026");
        assert!(prompt.contains("Max iterations: 6"));
        assert!(prompt.contains("current year as 2026"));
        assert!(prompt.ends_with("Current query: quantum sensors"));
        assert!(normalize_ascii(&prompt).is_ascii());
    }

    #[test]
    fn guard_request_lists_sources() {
        let text = guard_request("q", "report body", &["u1".into(), "u2".into()]);
        assert!(text.contains("Query:\nq"));
        assert!(text.contains("Draft report:\nreport body"));
        assert!(text.ends_with("Sources:\n- u1\n- u2"));

        let text = guard_request("q", "r", &[]);
        assert!(text.ends_with("Sources:\nNone provided"));
    }

    #[test]
    fn guard_request_caps_sources_and_report() {
        let sources: Vec<String> = (0..20).map(|i| format!("s{i}")).collect();
        let long = "x".repeat(5000);
        let text = guard_request("q", &long, &sources);
        assert_eq!(text.matches("\n- s").count(), 12);
        assert!(!text.contains(&"x".repeat(4001)));
    }
}
