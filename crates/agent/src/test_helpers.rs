//! Shared test helpers for agent tests.

use async_trait::async_trait;
use serde_json::Value;
use sleuth_core::error::{ProviderError, ToolError};
use sleuth_core::message::MessageToolCall;
use sleuth_core::provider::{Completion, CompletionRequest, Provider, Usage};
use sleuth_core::tool::{ToolConnector, ToolKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue and records
/// the request. Once the script runs out every call fails.
pub struct SequentialMockProvider {
    name: String,
    replies: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Result<Completion, ProviderError>>) -> Self {
        Self::named("sequential_mock", replies)
    }

    pub fn named(name: &str, replies: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> String {
        "mock-model".into()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens + output_tokens) * 1e-6
    }
}

fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 5,
        total_tokens: 15,
    }
}

/// A text-only completion.
pub fn make_text_completion(text: &str) -> Completion {
    Completion {
        content: text.into(),
        tool_calls: Vec::new(),
        usage: usage(),
        cost_usd: 0.001,
        model: "mock-model".into(),
        provider: String::new(),
        finish_reason: Some("stop".into()),
    }
}

/// A completion carrying tool calls and optional reasoning text.
pub fn make_tool_completion(tool_calls: Vec<MessageToolCall>, thought: &str) -> Completion {
    Completion {
        tool_calls,
        finish_reason: Some("tool_calls".into()),
        ..make_text_completion(thought)
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: Value) -> MessageToolCall {
    make_raw_tool_call(name, &serde_json::to_string(&args).unwrap())
}

/// A tool call whose arguments are sent verbatim.
pub fn make_raw_tool_call(name: &str, raw: &str) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: raw.to_string(),
    }
}

/// A guard reply approving or rejecting the draft.
pub fn make_guard_reply(allow: bool, feedback: &str) -> Completion {
    make_text_completion(
        &serde_json::json!({"allow_finish": allow, "feedback": feedback}).to_string(),
    )
}

/// A tool connector returning scripted outputs per tool.
///
/// Queued outputs are returned first; afterwards the tool's fallback is
/// used, or an empty success.
#[derive(Default)]
pub struct ScriptedConnector {
    queued: Mutex<HashMap<ToolKind, VecDeque<Value>>>,
    fallback: HashMap<ToolKind, Value>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(ToolKind, Value)>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, tool: ToolKind, output: Value) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(tool)
            .or_default()
            .push_back(output);
        self
    }

    pub fn with_fallback(mut self, tool: ToolKind, output: Value) -> Self {
        self.fallback.insert(tool, output);
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(ToolKind, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolConnector for ScriptedConnector {
    async fn execute(&self, tool: ToolKind, arguments: Value) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push((tool, arguments));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&tool)
            .and_then(VecDeque::pop_front);
        Ok(queued
            .or_else(|| self.fallback.get(&tool).cloned())
            .unwrap_or_else(|| serde_json::json!({"status": "success"})))
    }
}

/// `n` web results shaped like a search connector's output.
pub fn web_results(n: usize) -> Value {
    let results: Vec<Value> = (0..n)
        .map(|i| {
            serde_json::json!({
                "title": format!("Result {}", i + 1),
                "url": format!("https://example.com/{}", i + 1),
                "domain": "example.com",
                "summary": format!("Summary {}", i + 1),
            })
        })
        .collect();
    serde_json::json!({
        "status": "success",
        "results": results,
        "total_found": n,
        "provider": "mock",
        "notes": [],
    })
}
