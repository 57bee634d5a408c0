//! OpenAI provider.
//!
//! Speaks two wire formats:
//! - Chat Completions (`/chat/completions`) for gpt-4.x and older models
//! - the Responses API (`/responses`) for the gpt-5 family, which needs
//!   fixed temperature, a reasoning effort, and `fc`-prefixed call ids

use async_trait::async_trait;
use serde_json::{Value, json};
use sleuth_config::ProviderConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::message::{Message, MessageToolCall, Role};
use sleuth_core::provider::*;
use sleuth_telemetry::PriceTable;
use std::time::Duration;
use tracing::{debug, info};

use crate::wire::{self, arguments_to_string, normalize_content, u64_field};

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI LLM provider.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    max_completion_tokens: Option<u32>,
    reasoning_effort: Option<String>,
    pricing: PriceTable,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: None,
            max_completion_tokens: None,
            reasoning_effort: None,
            pricing: PriceTable::openai(),
            client: wire::http_client(Duration::from_secs(120))?,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("openai: missing api_key".into()))?;
        let mut provider = Self::new(api_key, config.model.as_deref().unwrap_or(DEFAULT_MODEL))?;
        if let Some(url) = &config.api_url {
            provider = provider.with_base_url(url);
        }
        provider.max_tokens = config.max_tokens;
        provider.max_completion_tokens = config.max_completion_tokens;
        provider.reasoning_effort = config.reasoning_effort.clone();
        Ok(provider)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// gpt-5 models only accept the Responses API.
    fn uses_responses_api(&self) -> bool {
        self.model.starts_with("gpt-5")
    }

    fn token_budget(&self, request: &CompletionRequest) -> Option<u32> {
        if request.max_tokens > 0 {
            Some(request.max_tokens)
        } else {
            self.max_tokens
        }
    }

    // ── Chat Completions ───────────────────────────────────────────

    fn chat_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": to_chat_messages(&request.messages),
            "temperature": request.temperature,
        });

        if let Some(budget) = self.token_budget(request) {
            body["max_tokens"] = json!(budget);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(to_chat_tools(&request.tools));
            body["tool_choice"] = match &request.tool_choice {
                Some(ToolChoice::Function(name)) => {
                    json!({"type": "function", "function": {"name": name}})
                }
                _ => json!("auto"),
            };
        }

        body
    }

    fn parse_chat(&self, response: &Value) -> Result<Completion, ProviderError> {
        let choice = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let (content, tool_calls) = parse_chat_message(choice.get("message").unwrap_or(&Value::Null));

        let usage = response.get("usage").unwrap_or(&Value::Null);
        let usage = Usage::from_parts(
            u64_field(usage, "prompt_tokens"),
            u64_field(usage, "completion_tokens"),
            u64_field(usage, "total_tokens"),
        );

        Ok(self.completion(
            content,
            tool_calls,
            usage,
            choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(String::from),
        ))
    }

    async fn complete_chat(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = self.chat_body(request);

        let response = match self.post(&url, &body).await {
            Err(ProviderError::ApiError { status_code: 400, message })
                if message.contains("max_completion_tokens") && body.get("max_tokens").is_some() =>
            {
                info!(
                    model = %self.model,
                    "OpenAI model requires 'max_completion_tokens'; retrying request"
                );
                if let Some(obj) = body.as_object_mut() {
                    if let Some(budget) = obj.remove("max_tokens") {
                        obj.insert("max_completion_tokens".into(), budget);
                    }
                }
                self.post(&url, &body).await?
            }
            other => other?,
        };

        self.parse_chat(&response)
    }

    // ── Responses API ──────────────────────────────────────────────

    fn responses_body(&self, request: &CompletionRequest) -> Value {
        if (request.temperature - 1.0).abs() > 1e-6 {
            debug!(
                requested = request.temperature,
                "gpt-5 models require temperature=1.0; overriding"
            );
        }

        let mut body = json!({
            "model": self.model,
            "input": to_responses_input(&request.messages),
            "temperature": 1.0,
            "reasoning": {"effort": self.reasoning_effort.as_deref().unwrap_or("low")},
        });

        if let Some(limit) = self.max_completion_tokens {
            body["max_output_tokens"] = json!(limit);
        }

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        })
                    })
                    .collect(),
            );
            if let Some(choice) = &request.tool_choice {
                body["tool_choice"] = match choice {
                    ToolChoice::Function(name) => json!({"type": "function", "name": name}),
                    ToolChoice::Auto => json!("auto"),
                };
            }
        }

        body
    }

    fn parse_responses(&self, response: &Value) -> Result<Completion, ProviderError> {
        let mut text_chunks: Vec<String> = Vec::new();
        let mut tool_calls: Vec<MessageToolCall> = Vec::new();

        let outputs = response
            .get("output")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in outputs {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => {
                    let parts = item
                        .get("content")
                        .and_then(Value::as_array)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    for part in parts {
                        match part.get("type").and_then(Value::as_str) {
                            Some("output_text") => {
                                if let Some(text) = part.get("text").and_then(Value::as_str) {
                                    if !text.is_empty() {
                                        text_chunks.push(text.to_string());
                                    }
                                }
                            }
                            Some("function_call") | Some("tool_call") => {
                                tool_calls.push(responses_call(part));
                            }
                            _ => {}
                        }
                    }
                }
                Some("function_call") => tool_calls.push(responses_call(item)),
                _ => {}
            }
        }

        if text_chunks.is_empty() {
            if let Some(text) = response.get("output_text").and_then(Value::as_str) {
                text_chunks.push(text.to_string());
            }
        }

        let usage = response.get("usage").unwrap_or(&Value::Null);
        let usage = Usage::from_parts(
            u64_field(usage, "input_tokens"),
            u64_field(usage, "output_tokens"),
            u64_field(usage, "total_tokens"),
        );

        let finish_reason = response
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("completed")
            .to_string();

        Ok(self.completion(
            text_chunks.join("\n"),
            tool_calls,
            usage,
            Some(finish_reason),
        ))
    }

    async fn complete_responses(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/responses", self.base_url);
        let body = self.responses_body(request);
        let response = self.post(&url, &body).await?;
        self.parse_responses(&response)
    }

    // ── Shared ─────────────────────────────────────────────────────

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        let request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        wire::post_json(request, body, "openai").await
    }

    fn completion(
        &self,
        content: String,
        tool_calls: Vec<MessageToolCall>,
        usage: Usage,
        finish_reason: Option<String>,
    ) -> Completion {
        Completion {
            content,
            tool_calls,
            usage,
            cost_usd: self.estimate_cost(usage.input_tokens, usage.output_tokens),
            model: self.model.clone(),
            provider: "openai".into(),
            finish_reason,
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        debug!(
            model = %self.model,
            responses_api = self.uses_responses_api(),
            messages = request.messages.len(),
            "Sending completion request"
        );
        if self.uses_responses_api() {
            self.complete_responses(&request).await
        } else {
            self.complete_chat(&request).await
        }
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing.cost(&self.model, input_tokens, output_tokens)
    }
}

/// Convert messages to Chat Completions format. Shared with OpenRouter.
pub(crate) fn to_chat_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": m.role.as_str(),
                "content": m.content,
            });
            if m.has_tool_calls() {
                if m.content.is_empty() {
                    msg["content"] = Value::Null;
                }
                msg["tool_calls"] = Value::Array(
                    m.tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {"name": tc.name, "arguments": tc.arguments},
                            })
                        })
                        .collect(),
                );
            }
            if let Some(id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(id);
            }
            msg
        })
        .collect()
}

/// Convert tool definitions to Chat Completions format. Shared with OpenRouter.
pub(crate) fn to_chat_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                },
            })
        })
        .collect()
}

/// Extract text and tool calls from a Chat Completions message.
pub(crate) fn parse_chat_message(message: &Value) -> (String, Vec<MessageToolCall>) {
    let content = normalize_content(message.get("content").unwrap_or(&Value::Null));
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .map(|(i, tc)| {
                    let function = tc.get("function").unwrap_or(&Value::Null);
                    let name = function
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    MessageToolCall {
                        id: tc
                            .get("id")
                            .and_then(Value::as_str)
                            .map(String::from)
                            .unwrap_or_else(|| format!("call_{name}_{i}")),
                        name,
                        arguments: arguments_to_string(function.get("arguments")),
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    (content, tool_calls)
}

/// Coerce a call id into the shape the Responses API accepts.
pub(crate) fn responses_call_id(id: &str) -> String {
    let base = if id.is_empty() { "function_call" } else { id };
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.starts_with("fc") {
        safe
    } else {
        format!("fc_{safe}")
    }
}

/// Convert a conversation into Responses API input items.
fn to_responses_input(messages: &[Message]) -> Vec<Value> {
    let mut inputs = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            Role::Tool => inputs.push(json!({
                "type": "function_call_output",
                "call_id": responses_call_id(m.tool_call_id.as_deref().unwrap_or("tool_call")),
                "output": m.content,
            })),
            Role::User | Role::System => inputs.push(json!({
                "role": m.role.as_str(),
                "content": [{"type": "input_text", "text": m.content}],
            })),
            Role::Assistant => {
                if !m.content.is_empty() {
                    inputs.push(json!({
                        "role": "assistant",
                        "content": [{"type": "output_text", "text": m.content}],
                    }));
                }
                for tc in &m.tool_calls {
                    inputs.push(json!({
                        "type": "function_call",
                        "call_id": responses_call_id(&tc.id),
                        "name": tc.name,
                        "arguments": tc.arguments,
                    }));
                }
            }
        }
    }
    inputs
}

fn responses_call(item: &Value) -> MessageToolCall {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = item
        .get("call_id")
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| if name.is_empty() { "function_call".into() } else { name.clone() });
    MessageToolCall {
        id,
        name,
        arguments: arguments_to_string(item.get("arguments")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAiProvider {
        OpenAiProvider::new("sk-test", model).unwrap()
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition {
            name: "web_search".into(),
            description: "Search the web".into(),
            parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }
    }

    #[test]
    fn picks_api_by_model() {
        assert!(provider("gpt-5-mini").uses_responses_api());
        assert!(!provider("gpt-4.1-mini").uses_responses_api());
    }

    #[test]
    fn chat_body_includes_tools_and_choice() {
        let req = CompletionRequest::new(vec![Message::user("hi")])
            .with_tools(vec![search_tool()])
            .with_tool_choice(ToolChoice::Function("web_search".into()))
            .with_max_tokens(500);
        let body = provider("gpt-4.1-mini").chat_body(&req);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["tools"][0]["function"]["name"], "web_search");
        assert_eq!(body["tool_choice"]["function"]["name"], "web_search");

        let req = CompletionRequest::new(vec![Message::user("hi")]);
        let body = provider("gpt-4.1-mini").chat_body(&req);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn chat_messages_carry_tool_calls() {
        let messages = vec![
            Message::assistant_with_tools(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "web_search".into(),
                    arguments: "{\"query\":\"rust\"}".into(),
                }],
            ),
            Message::tool_result("call_1", "results"),
        ];
        let api = to_chat_messages(&messages);
        assert!(api[0]["content"].is_null());
        assert_eq!(api[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(api[1]["role"], "tool");
        assert_eq!(api[1]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_chat_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": [{"type": "text", "text": "thinking"}],
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\":\"x\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 500}
        });
        let completion = provider("gpt-4.1").parse_chat(&response).unwrap();
        assert_eq!(completion.content, "thinking");
        assert_eq!(completion.tool_calls[0].name, "web_search");
        assert_eq!(completion.usage.total_tokens, 1500);
        // (1000 * 2 + 500 * 8) / 1M
        assert!((completion.cost_usd - 0.006).abs() < 1e-12);
        assert_eq!(completion.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn parse_chat_without_choices_fails() {
        let err = provider("gpt-4.1").parse_chat(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn responses_call_ids_are_coerced() {
        assert_eq!(responses_call_id("call_abc"), "fc_call_abc");
        assert_eq!(responses_call_id("fc_123"), "fc_123");
        assert_eq!(responses_call_id("call a/b"), "fc_call_a_b");
        assert_eq!(responses_call_id(""), "fc_function_call");
    }

    #[test]
    fn responses_body_shape() {
        let messages = vec![
            Message::system("rules"),
            Message::user("query"),
            Message::assistant_with_tools(
                "plan",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "web_search".into(),
                    arguments: "{}".into(),
                }],
            ),
            Message::tool_result("call_1", "out"),
        ];
        let req = CompletionRequest::new(messages)
            .with_tools(vec![search_tool()])
            .with_temperature(0.3);
        let body = provider("gpt-5-mini").responses_body(&req);

        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["reasoning"]["effort"], "low");
        assert_eq!(body["tools"][0]["name"], "web_search");
        assert!(body.get("tool_choice").is_none());

        let input = body["input"].as_array().unwrap();
        assert_eq!(input[0]["content"][0]["type"], "input_text");
        assert_eq!(input[2]["content"][0]["type"], "output_text");
        assert_eq!(input[3]["type"], "function_call");
        assert_eq!(input[3]["call_id"], "fc_call_1");
        assert_eq!(input[4]["type"], "function_call_output");
        assert_eq!(input[4]["call_id"], "fc_call_1");
    }

    #[test]
    fn parse_responses_output() {
        let response = json!({
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Looking up"}]},
                {"type": "function_call", "call_id": "fc_1", "name": "web_search", "arguments": {"query": "q"}}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 50, "total_tokens": 150}
        });
        let completion = provider("gpt-5").parse_responses(&response).unwrap();
        assert_eq!(completion.content, "Looking up");
        assert_eq!(completion.tool_calls[0].id, "fc_1");
        assert_eq!(completion.tool_calls[0].arguments, "{\"query\":\"q\"}");
        assert_eq!(completion.usage.total_tokens, 150);
        assert_eq!(completion.finish_reason.as_deref(), Some("completed"));
    }

    #[test]
    fn parse_responses_falls_back_to_output_text() {
        let response = json!({"output": [], "output_text": "plain"});
        let completion = provider("gpt-5-nano").parse_responses(&response).unwrap();
        assert_eq!(completion.content, "plain");
    }
}
