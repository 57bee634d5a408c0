//! Google Gemini provider (REST `generateContent`).
//!
//! Gemini has no system or tool roles, so the conversation is reshaped:
//! system text rides on the next user turn, tool results become
//! `functionResponse` parts in a user turn, and assistant turns become
//! `model` turns carrying `functionCall` parts.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sleuth_config::ProviderConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::message::{Message, MessageToolCall, Role, find_tool_name};
use sleuth_core::provider::*;
use sleuth_telemetry::PriceTable;
use std::time::Duration;
use tracing::debug;

use crate::wire::{self, u64_field};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords Gemini accepts in function declarations.
const ALLOWED_SCHEMA_KEYS: &[&str] = &[
    "type",
    "nullable",
    "required",
    "format",
    "description",
    "properties",
    "items",
    "enum",
    "anyOf",
    "$ref",
    "$defs",
];

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    pricing: PriceTable,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            pricing: PriceTable::gemini(),
            client: wire::http_client(Duration::from_secs(120))?,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("gemini: missing api_key".into()))?;
        let provider = Self::new(api_key, config.model.as_deref().unwrap_or(DEFAULT_MODEL))?;
        Ok(match &config.api_url {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        let contents = to_gemini_contents(&request.messages);
        if contents.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Empty conversation - no messages to send to Gemini".into(),
            ));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": clean_schema(&t.parameters),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);

            if let Some(ToolChoice::Function(name)) = &request.tool_choice {
                body["toolConfig"] = json!({
                    "functionCallingConfig": {
                        "mode": "ANY",
                        "allowedFunctionNames": [name],
                    }
                });
            }
        }

        Ok(body)
    }

    fn parse_response(&self, response: &Value) -> Result<Completion, ProviderError> {
        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            if reason != "BLOCK_REASON_UNSPECIFIED" {
                return Err(ProviderError::SafetyBlocked(format!("Gemini safety block: {reason}")));
            }
        }

        let candidates = response
            .get("candidates")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("Gemini returned no candidates".into()))?;

        let millis = chrono::Utc::now().timestamp_millis();
        let mut chunks: Vec<String> = Vec::new();
        let mut tool_calls: Vec<MessageToolCall> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();

        for candidate in candidates {
            let reason = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_uppercase();
            if reason == "SAFETY" {
                return Err(ProviderError::SafetyBlocked(
                    "Gemini blocked output for safety".into(),
                ));
            }
            if !reason.is_empty() && !reasons.contains(&reason) {
                reasons.push(reason);
            }

            let parts = candidate
                .pointer("/content/parts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for part in parts {
                if let Some(call) = part.get("functionCall") {
                    let name = call
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let mut id = format!("call_{name}_{millis}");
                    if !tool_calls.is_empty() {
                        id.push_str(&format!("_{}", tool_calls.len()));
                    }
                    let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                    tool_calls.push(MessageToolCall {
                        id,
                        name,
                        arguments: args.to_string(),
                    });
                }
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    let text = text.trim();
                    if !text.is_empty() {
                        chunks.push(text.to_string());
                    }
                }
            }
        }

        let content = chunks.join("\n");
        if content.is_empty() && tool_calls.is_empty() {
            let reason = if reasons.is_empty() {
                "UNKNOWN".to_string()
            } else {
                reasons.join(", ")
            };
            return Err(ProviderError::InvalidResponse(format!(
                "Gemini returned no content or tool calls (finish_reason={reason})"
            )));
        }

        let metadata = response.get("usageMetadata").unwrap_or(&Value::Null);
        let usage = Usage::from_parts(
            u64_field(metadata, "promptTokenCount"),
            u64_field(metadata, "candidatesTokenCount"),
            None,
        );

        Ok(Completion {
            content,
            tool_calls,
            usage,
            cost_usd: self.estimate_cost(usage.input_tokens, usage.output_tokens),
            model: self.model.clone(),
            provider: "gemini".into(),
            finish_reason: Some(reasons.join(",").to_lowercase()),
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let body = self.request_body(&request)?;
        debug!(
            model = %self.model,
            turns = body["contents"].as_array().map_or(0, Vec::len),
            "Sending Gemini request"
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let http = self.client.post(&url).header("x-goog-api-key", &self.api_key);
        let response = wire::post_json(http, &body, "gemini").await?;
        self.parse_response(&response)
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing.cost(&self.model, input_tokens, output_tokens)
    }
}

/// Reshape a conversation into Gemini `contents`.
fn to_gemini_contents(messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_system: Vec<&str> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                if !msg.content.is_empty() {
                    pending_system.push(&msg.content);
                }
            }
            Role::User => {
                let mut parts = std::mem::take(&mut pending_responses);
                let text = if pending_system.is_empty() {
                    msg.content.clone()
                } else {
                    let system = pending_system.join("\n\n");
                    pending_system.clear();
                    format!("{system}\n\n{}", msg.content)
                };
                if !text.is_empty() {
                    parts.push(json!({"text": text}));
                }
                if !parts.is_empty() {
                    contents.push(json!({"role": "user", "parts": parts}));
                }
            }
            Role::Assistant => {
                if !pending_responses.is_empty() {
                    contents.push(json!({
                        "role": "user",
                        "parts": std::mem::take(&mut pending_responses),
                    }));
                }
                let mut parts: Vec<Value> = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(json!({"text": msg.content}));
                }
                for tc in &msg.tool_calls {
                    let args = serde_json::from_str::<Value>(&tc.arguments)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| json!({}));
                    parts.push(json!({"functionCall": {"name": tc.name, "args": args}}));
                }
                if parts.is_empty() {
                    parts.push(json!({"text": ""}));
                }
                contents.push(json!({"role": "model", "parts": parts}));
            }
            Role::Tool => {
                let call_id = msg.tool_call_id.as_deref().unwrap_or_default();
                let name = find_tool_name(messages, call_id).unwrap_or("unknown_function");
                pending_responses.push(json!({
                    "functionResponse": {
                        "name": name,
                        "response": {"result": msg.content},
                    }
                }));
            }
        }
    }

    let mut trailing = pending_responses;
    if !pending_system.is_empty() {
        trailing.push(json!({"text": pending_system.join("\n\n")}));
    }
    if !trailing.is_empty() {
        contents.push(json!({"role": "user", "parts": trailing}));
    }

    contents
}

/// Strip schema keywords Gemini rejects, recursively.
fn clean_schema(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut cleaned = Map::new();
    for (key, value) in obj {
        if !ALLOWED_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = match (key.as_str(), value) {
            ("properties", Value::Object(props)) => Value::Object(
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), clean_schema(v)))
                    .collect(),
            ),
            ("items", Value::Object(_)) => clean_schema(value),
            ("anyOf", Value::Array(items)) => Value::Array(items.iter().map(clean_schema).collect()),
            ("enum", Value::Array(items)) => {
                Value::Array(items.iter().filter(|v| !v.is_null()).cloned().collect())
            }
            _ => value.clone(),
        };
        cleaned.insert(key.clone(), value);
    }
    Value::Object(cleaned)
}
