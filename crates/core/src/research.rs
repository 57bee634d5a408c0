//! Research session artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recorded iteration: the first tool call of that iteration and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub iteration: u32,
    pub thought: String,
    pub action: String,
    pub action_input: serde_json::Value,
    pub observation: String,
    pub tool_output: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub tokens_used: u32,
    pub cost_usd: f64,
    pub latency_seconds: f64,
}

/// How a session ended. Every session ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchStatus {
    Completed,
    Incomplete,
    Failed,
    Timeout,
}

impl ResearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal artifact of one research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub session_id: String,
    pub query: String,
    pub report: String,
    pub sources: Vec<String>,
    pub steps: Vec<AgentStep>,
    pub total_iterations: u32,
    pub total_duration_seconds: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub status: ResearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchResult {
    /// Sum token and cost totals over `steps`.
    pub fn totals(steps: &[AgentStep]) -> (u64, f64) {
        steps.iter().fold((0u64, 0.0f64), |(tokens, cost), step| {
            (tokens + u64::from(step.tokens_used), cost + step.cost_usd)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tokens: u32, cost: f64) -> AgentStep {
        AgentStep {
            iteration: 1,
            thought: String::new(),
            action: "web_search".into(),
            action_input: serde_json::json!({}),
            observation: String::new(),
            tool_output: serde_json::Value::Null,
            timestamp: Utc::now(),
            tokens_used: tokens,
            cost_usd: cost,
            latency_seconds: 0.0,
        }
    }

    #[test]
    fn totals_sum_over_steps() {
        let (tokens, cost) = ResearchResult::totals(&[step(10, 0.5), step(5, 0.25)]);
        assert_eq!(tokens, 15);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ResearchStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
