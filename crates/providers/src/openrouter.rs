//! OpenRouter provider with its own model-level fallback.
//!
//! One OpenRouter account fronts many models. Requests walk a priority
//! list of models; each model has its own failure counter and cooldown,
//! and models that reject tool use are remembered and skipped whenever
//! tools are offered.

use async_trait::async_trait;
use serde_json::{Value, json};
use sleuth_config::ProviderConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::*;
use sleuth_telemetry::PriceTable;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::health::ProviderHealth;
use crate::openai::{parse_chat_message, to_chat_messages, to_chat_tools};
use crate::wire::{self, normalize_content, u64_field};

pub const DEFAULT_MODEL: &str = "nvidia/llama-3.3-nemotron-super-49b-v1.5";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Models tried after the configured ones.
pub const DEFAULT_MODEL_PRIORITY: [&str; 4] = [
    "deepseek/deepseek-r1-0528:free",
    "minimax/minimax-m2:free",
    "meta-llama/llama-3.3-70b-instruct:free",
    "nvidia/llama-3.3-nemotron-super-49b-v1.5",
];

/// Failures before a model is cooled down.
const MODEL_FAILURE_THRESHOLD: u32 = 2;

const APP_REFERER: &str = "https://github.com/sleuth-agent/sleuth";
const APP_TITLE: &str = "Sleuth Research Agent";

/// Error texts that mean "this model cannot do tool calls".
const TOOL_UNSUPPORTED_MARKERS: [&str; 3] = [
    "tools are not supported",
    "no endpoints found that support tool use",
    "tool use not supported",
];

pub struct OpenRouterProvider {
    base_url: String,
    api_key: String,
    models: Vec<String>,
    current: AtomicUsize,
    model_health: ProviderHealth,
    tool_incompatible: RwLock<HashSet<String>>,
    pricing: PriceTable,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Create a provider; `model` and `alternates` are tried before the defaults.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        alternates: &[String],
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        let mut models: Vec<String> = Vec::new();
        let candidates = std::iter::once(model.as_str())
            .chain(alternates.iter().map(String::as_str))
            .chain(DEFAULT_MODEL_PRIORITY);
        for candidate in candidates {
            if !candidate.is_empty() && !models.iter().any(|m| m == candidate) {
                models.push(candidate.to_string());
            }
        }

        info!(models = %models.join(", "), "Initialized OpenRouter provider");

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            models,
            current: AtomicUsize::new(0),
            model_health: ProviderHealth::new(),
            tool_incompatible: RwLock::new(HashSet::new()),
            pricing: PriceTable::openrouter(),
            client: wire::http_client(Duration::from_secs(60))?,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("openrouter: missing api_key".into()))?;
        let provider = Self::new(
            api_key,
            config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            &config.alternate_models,
        )?;
        Ok(match &config.api_url {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the per-model health tracker (e.g. to change the cooldown).
    pub fn with_model_health(mut self, health: ProviderHealth) -> Self {
        self.model_health = health;
        self
    }

    /// The model priority list, de-duplicated.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Whether `model` has been marked as unable to use tools.
    pub async fn is_tool_incompatible(&self, model: &str) -> bool {
        self.tool_incompatible.read().await.contains(model)
    }

    fn request_body(&self, model: &str, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": model,
            "messages": to_chat_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
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

    /// Parse one model's reply. `Ok(None)` means the reply had no choices.
    fn parse_reply(
        &self,
        model: &str,
        data: &Value,
        tools_offered: bool,
    ) -> Result<Option<Completion>, ProviderError> {
        let Some(choice) = data
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
        else {
            return Ok(None);
        };

        let (mut content, tool_calls) = parse_chat_message(choice.get("message").unwrap_or(&Value::Null));
        if content.is_empty() {
            if let Some(fallback) = choice.get("text").or_else(|| choice.get("content")) {
                content = normalize_content(fallback);
            }
        }

        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(String::from);

        if tools_offered && tool_calls.is_empty() {
            let reason = finish_reason.as_deref().unwrap_or_default();
            if reason != "stop" && reason != "length" {
                warn!(
                    model,
                    finish_reason = reason,
                    "Model may not support function calling"
                );
            }
        }

        if content.is_empty() && tool_calls.is_empty() {
            return Err(ProviderError::EmptyContent(model.to_string()));
        }

        let usage = data.get("usage").unwrap_or(&Value::Null);
        let usage = Usage::from_parts(
            u64_field(usage, "prompt_tokens"),
            u64_field(usage, "completion_tokens"),
            u64_field(usage, "total_tokens"),
        );

        Ok(Some(Completion {
            content,
            tool_calls,
            usage,
            cost_usd: self.pricing.cost(model, usage.input_tokens, usage.output_tokens),
            model: model.to_string(),
            provider: "openrouter".into(),
            finish_reason,
        }))
    }

    async fn mark_tool_incompatible(&self, model: &str) {
        warn!(
            model,
            "OpenRouter model does not support tool calls; skipping for future tool requests"
        );
        self.tool_incompatible.write().await.insert(model.to_string());
    }

    async fn register_failure(&self, model: &str, error: &ProviderError) {
        if self
            .model_health
            .record_failure(model, MODEL_FAILURE_THRESHOLD)
            .await
        {
            warn!(
                model,
                cooldown_secs = self.model_health.cooldown().as_secs(),
                error = %error,
                "Temporarily disabling OpenRouter model after repeated failures"
            );
        }
    }
}

fn is_tool_unsupported(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    TOOL_UNSUPPORTED_MARKERS.iter().any(|m| lower.contains(m))
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> String {
        let idx = self.current.load(Ordering::Relaxed);
        self.models.get(idx).cloned().unwrap_or_default()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let tools_offered = !request.tools.is_empty();
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<ProviderError> = None;

        for (idx, model) in self.models.iter().enumerate() {
            if tools_offered && self.is_tool_incompatible(model).await {
                debug!(model = %model, "Skipping OpenRouter model (does not support tools)");
                continue;
            }
            if !self.model_health.is_available(model).await {
                debug!(model = %model, "Skipping OpenRouter model (cooldown active)");
                continue;
            }

            let body = self.request_body(model, &request);
            let http = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("HTTP-Referer", APP_REFERER)
                .header("X-Title", APP_TITLE);

            let data = match wire::post_json(http, &body, "openrouter").await {
                Ok(data) => data,
                Err(e) => {
                    warn!(model = %model, error = %e, "OpenRouter request failed");
                    if is_tool_unsupported(&e.to_string()) {
                        self.mark_tool_incompatible(model).await;
                        last_error.get_or_insert(ProviderError::ToolsUnsupported(model.clone()));
                        continue;
                    }
                    self.register_failure(model, &e).await;
                    last_error = Some(e);
                    continue;
                }
            };

            match self.parse_reply(model, &data, tools_offered) {
                Ok(Some(completion)) => {
                    self.current.store(idx, Ordering::Relaxed);
                    self.model_health.record_success(model).await;
                    return Ok(completion);
                }
                Ok(None) => {
                    let detail = data
                        .pointer("/error/message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error");
                    let e = ProviderError::InvalidResponse(format!(
                        "Invalid response from OpenRouter ({model}): {detail}"
                    ));
                    warn!(error = %e, "OpenRouter reply had no choices");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(model = %model, "OpenRouter model returned empty content; trying next available model");
                    self.register_failure(model, &e).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::NotConfigured("OpenRouter call failed - no models available".into())
        }))
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing.cost(&self.model(), input_tokens, output_tokens)
    }

    fn count_tokens(&self, text: &str) -> usize {
        (text.len() as f64 / 3.5) as usize
    }
}
