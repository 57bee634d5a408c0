//! Finish guard: an independent reviewer call before a session may end.
//!
//! The guard is advisory. Any failure of the review call approves.

use serde_json::{Map, Value};
use sleuth_core::message::Message;
use sleuth_core::provider::CompletionRequest;
use sleuth_providers::CompletionManager;
use tracing::{info, warn};

use crate::prompts;

pub const UNAVAILABLE: &str = "Finish guard unavailable; proceeding.";
pub const APPROVED_DEFAULT: &str = "Coverage looks solid; ready to finalize.";
pub const REJECTED_DEFAULT: &str = "Finish guard check failed: gather at least one more \
high-quality source before calling finish again.";

/// The reviewer's decision on one draft.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub approved: bool,
    pub feedback: String,
    pub hint: Option<String>,
}

impl GuardVerdict {
    fn unavailable() -> Self {
        Self {
            approved: true,
            feedback: UNAVAILABLE.into(),
            hint: None,
        }
    }

    /// Approval used when the guard is switched off.
    pub fn disabled() -> Self {
        Self {
            approved: true,
            feedback: "Finish guard disabled.".into(),
            hint: None,
        }
    }

    /// Build a verdict from the reviewer's JSON object.
    pub fn from_decision(decision: &Map<String, Value>) -> Self {
        let approved = match decision.get("allow_finish") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !matches!(s.trim().to_lowercase().as_str(), "false" | "no" | "0" | ""),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(_) => true,
        };
        let feedback = decision
            .get("feedback")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| if approved { APPROVED_DEFAULT.into() } else { String::new() });
        let hint = decision
            .get("next_action_hint")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        Self {
            approved,
            feedback,
            hint,
        }
    }

    /// Feedback to show the model on rejection, never empty.
    pub fn rejection(&self) -> &str {
        if self.feedback.is_empty() {
            REJECTED_DEFAULT
        } else {
            &self.feedback
        }
    }
}

/// Parse the reviewer's reply, tolerating fenced code blocks.
pub fn parse_decision(content: &str) -> Map<String, Value> {
    fn try_parse(candidate: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    if content.trim().is_empty() {
        return Map::new();
    }
    if let Some(map) = try_parse(content.trim()) {
        return map;
    }
    if content.contains("```") {
        for segment in content.split("```") {
            let mut segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if segment.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("json")) {
                segment = segment[4..].trim();
            }
            if let Some(map) = try_parse(segment) {
                return map;
            }
        }
    }
    Map::new()
}

/// Review a draft report through `manager`.
pub async fn review(
    manager: &CompletionManager,
    query: &str,
    report: &str,
    sources: &[String],
) -> GuardVerdict {
    let request = CompletionRequest::new(vec![
        Message::system(prompts::GUARD_SYSTEM),
        Message::user(prompts::guard_request(query, report, sources)),
    ])
    .with_temperature(0.2)
    .with_max_tokens(400)
    .require_content(true);

    match manager.complete(request).await {
        Ok(completion) => {
            let verdict = GuardVerdict::from_decision(&parse_decision(&completion.content));
            info!(approved = verdict.approved, provider = %completion.provider, "Finish guard reviewed draft");
            verdict
        }
        Err(e) => {
            warn!("Finish guard failed: {e}");
            GuardVerdict::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SequentialMockProvider, make_text_completion};
    use serde_json::json;
    use sleuth_core::error::ProviderError;
    use sleuth_providers::ProviderHealth;
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        assert_eq!(
            parse_decision(r#"{"allow_finish": false}"#)["allow_finish"],
            json!(false)
        );
        let fenced = "Here you go:\n```json\n{\"allow_finish\": true, \"feedback\": \"ok\"}\n```";
        assert_eq!(parse_decision(fenced)["feedback"], "ok");
        assert!(parse_decision("no json here").is_empty());
        assert!(parse_decision("").is_empty());
    }

    #[test]
    fn missing_allow_finish_approves() {
        let verdict = GuardVerdict::from_decision(&Map::new());
        assert!(verdict.approved);
        assert_eq!(verdict.feedback, APPROVED_DEFAULT);
        assert_eq!(verdict.hint, None);
    }

    #[test]
    fn rejection_carries_hint() {
        let verdict = GuardVerdict::from_decision(&object(json!({
            "allow_finish": false,
            "next_action_hint": "search for 2025 pricing"
        })));
        assert!(!verdict.approved);
        assert_eq!(verdict.feedback, "");
        assert_eq!(verdict.rejection(), REJECTED_DEFAULT);
        assert_eq!(verdict.hint.as_deref(), Some("search for 2025 pricing"));
    }

    #[tokio::test]
    async fn review_uses_reviewer_reply() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Ok(make_text_completion(
            r#"{"allow_finish": false, "feedback": "Needs sources"}"#,
        ))]));
        let manager = CompletionManager::new(provider.clone(), ProviderHealth::new());

        let verdict = review(&manager, "q", "draft", &["u1".into()]).await;
        assert!(!verdict.approved);
        assert_eq!(verdict.feedback, "Needs sources");

        let request = &provider.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.max_tokens, 400);
        assert!(request.require_content);
    }

    #[tokio::test]
    async fn failing_review_approves() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(ProviderError::Timeout(
            "guard".into(),
        ))]));
        let manager = CompletionManager::new(provider, ProviderHealth::new());

        let verdict = review(&manager, "q", "draft", &[]).await;
        assert!(verdict.approved);
        assert_eq!(verdict.feedback, UNAVAILABLE);
    }
}
