//! Turning tool outputs into observations, summaries and counts.

use serde_json::{Map, Value};
use sleuth_core::message::MessageToolCall;
use sleuth_core::tool::ToolKind;

const OBSERVATION_LIMIT: usize = 3000;

/// Truncate to `max_len` characters, ending in `...` when shortened.
pub fn shorten(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_len.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn truncate(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

fn is_error(output: &Value) -> bool {
    output.get("status").and_then(Value::as_str) == Some("error")
}

fn error_text<'a>(output: &'a Value, default: &'a str) -> &'a str {
    output.get("error").and_then(Value::as_str).unwrap_or(default)
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn notes(output: &Value) -> Vec<String> {
    output
        .get("notes")
        .and_then(Value::as_array)
        .map(|notes| {
            notes
                .iter()
                .map(|n| match n {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn stat(stats: &Map<String, Value>, key: &str) -> u64 {
    stats.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Best-effort count of returned items.
pub fn result_count(output: &Value) -> usize {
    for key in ["results", "papers", "repositories"] {
        if let Some(items) = output.get(key).and_then(Value::as_array) {
            return items.len();
        }
    }
    match output.get("total_found") {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.max(0.0) as usize).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// The observation text appended to the conversation for `tool`.
pub fn format_observation(tool: ToolKind, output: &Value) -> String {
    let Value::Object(fields) = output else {
        return truncate(&output.to_string(), OBSERVATION_LIMIT);
    };
    if is_error(output) {
        return error_text(output, "Tool error").to_string();
    }

    let (list_key, meta_key) = match tool {
        ToolKind::WebSearch => ("results", "domain"),
        ToolKind::ArxivSearch => ("papers", "published_date"),
        ToolKind::GithubSearch => ("repositories", "language"),
        _ => ("", ""),
    };
    let evidence: Vec<String> = fields
        .get(list_key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(3)
                .map(|item| {
                    let title = str_field(item, "title")
                        .or_else(|| str_field(item, "name"))
                        .unwrap_or("result");
                    let source = str_field(item, meta_key)
                        .or_else(|| str_field(item, "domain"))
                        .or_else(|| str_field(item, "url"))
                        .unwrap_or("");
                    let snippet = str_field(item, "summary")
                        .or_else(|| str_field(item, "abstract"))
                        .or_else(|| str_field(item, "description"))
                        .map(|s| s.replace('\n', " ").trim().to_string())
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| "No summary provided".into());
                    format!("- {title} ({source}) - {}", shorten(&snippet, 220))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut insights = Vec::new();
    let count = result_count(output);
    if count > 0 {
        insights.push(format!(
            "{tool} surfaced {count} relevant items; focus on the strongest evidence for upcoming report sections."
        ));
    }
    if let Some(stats) = fields.get("pipeline_stats").and_then(Value::as_object).filter(|s| !s.is_empty()) {
        insights.push(format!(
            "Pipeline coverage: classified {}/{}, extracted {}, summarized {}, cache hits {}",
            stat(stats, "classified"),
            stat(stats, "input_items"),
            stat(stats, "extracted"),
            stat(stats, "summarized"),
            stat(stats, "cache_hits"),
        ));
        let failed_extraction = stat(stats, "failed_extraction");
        if failed_extraction > 0 {
            insights.push(format!(
                "Extraction gaps on {failed_extraction} sources - rerun or sample manually if signal feels thin."
            ));
        }
        let failed_summaries = stat(stats, "failed_summaries");
        if failed_summaries > 0 {
            insights.push(format!(
                "Summaries missing for {failed_summaries} sources; review raw snippets before finalizing conclusions."
            ));
        }
    }
    insights.extend(notes(output).into_iter().take(3));

    let mut sections = Vec::new();
    if !evidence.is_empty() {
        sections.push(format!("Evidence Highlights:\n{}", evidence.join("\n")));
    }
    if !insights.is_empty() {
        sections.push(format!("Insights & Next Steps:\n- {}", insights.join("\n- ")));
    }
    if !sections.is_empty() {
        return truncate(&sections.join("\n\n"), OBSERVATION_LIMIT);
    }

    let compact: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "full_text" | "raw_data"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let dumped = serde_json::to_string_pretty(&compact).unwrap_or_default();
    truncate(&dumped, OBSERVATION_LIMIT)
}

/// One-line summary of a tool output for traces and logs.
pub fn summarize_output(tool: ToolKind, output: &Value) -> String {
    if !output.is_object() {
        return "Tool output received".into();
    }
    if is_error(output) {
        return match output.get("error").and_then(Value::as_str) {
            Some(error) => error.to_string(),
            None => format!("{tool} failed"),
        };
    }

    let with_context = |mut base: String| {
        if let Some(provider) = str_field(output, "provider") {
            base.push_str(&format!(" via {provider}"));
        }
        if let Some(stats) = output.get("pipeline_stats").and_then(Value::as_object) {
            let (extracted, input) = (stat(stats, "extracted"), stat(stats, "input_items"));
            if extracted > 0 && input > 0 {
                base.push_str(&format!(" (processed {extracted}/{input} sources)"));
            }
        }
        if let Some(note) = notes(output).first() {
            base.push_str(&format!("; {note}"));
        }
        base
    };
    let total = output.get("total_found").cloned().unwrap_or(Value::from(0));

    if output.get("results").is_some() {
        with_context(format!("{total} web results"))
    } else if output.get("papers").is_some() {
        with_context(format!("{total} papers"))
    } else if output.get("repositories").is_some() {
        with_context(format!("{total} repositories"))
    } else if output.get("full_text").is_some() {
        let words = output.get("word_count").cloned().unwrap_or(Value::from(0));
        format!("PDF extracted: {words} words")
    } else {
        with_context("Tool output received".into())
    }
}

/// The `action` trace message for a tool call.
pub fn summarize_action(tool: &str, arguments: &Value) -> String {
    let empty = match arguments {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    };
    if empty {
        return format!("Executing {tool}");
    }
    let preview = truncate(&arguments.to_string(), 200);
    format!("Executing {tool} with {preview}")
}

/// Readable reasoning text when the model returned tool calls without any.
pub fn fallback_thought(calls: &[MessageToolCall], iteration: u32) -> String {
    let mut names: Vec<&str> = Vec::new();
    for call in calls {
        if !call.name.is_empty() && !names.contains(&call.name.as_str()) {
            names.push(&call.name);
        }
    }
    if names.is_empty() {
        return format!("Iteration {iteration}: planning next action.");
    }
    format!(
        "Planning to call {} based on the previous observation set; goal is to close remaining evidence gaps.",
        names.join(", ")
    )
}
