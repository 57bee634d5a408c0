//! Provider trait: the abstraction over language-model vendors.
//!
//! A Provider translates a uniform [`CompletionRequest`] into its vendor's
//! wire format and normalizes the reply into a [`Completion`].
//!
//! Implementations: OpenAI, Gemini, OpenRouter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// The vendors the completion layer knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    #[serde(alias = "google")]
    Gemini,
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::OpenAi, Self::Gemini, Self::OpenRouter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(ProviderError::NotConfigured(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// How the model may pick among the offered tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// The model must call this function.
    Function(String),
}

/// A uniform completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The conversation to send
    pub messages: Vec<Message>,

    /// Tools offered to the model (empty = none)
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Tool selection mode; only sent when tools are offered
    pub tool_choice: Option<ToolChoice>,

    /// Treat an empty text reply as a failed attempt
    pub require_content: bool,

    /// Treat a reply without tool calls as a failed attempt (only when tools are offered)
    pub require_tool_calls: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            temperature: 0.7,
            max_tokens: 2000,
            tool_choice: None,
            require_content: false,
            require_tool_calls: false,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn require_content(mut self, required: bool) -> Self {
        self.require_content = required;
        self
    }

    pub fn require_tool_calls(mut self, required: bool) -> Self {
        self.require_tool_calls = required;
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from possibly-missing vendor fields.
    ///
    /// Missing counts default to zero; a missing or zero total becomes input + output.
    pub fn from_parts(input: Option<u64>, output: Option<u64>, total: Option<u64>) -> Self {
        let input_tokens = input.unwrap_or(0) as u32;
        let output_tokens = output.unwrap_or(0) as u32;
        let total_tokens = match total {
            Some(t) if t > 0 => t as u32,
            _ => input_tokens.saturating_add(output_tokens),
        };
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A normalized completion reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Text content, normalized to one string (may be empty)
    pub content: String,

    /// Structured tool calls, in the order the model returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Token usage
    pub usage: Usage,

    /// Cost estimate in USD from the serving adapter's price table
    pub cost_usd: f64,

    /// Which model actually responded
    pub model: String,

    /// Which provider served the reply; stamped by the completion manager
    #[serde(default)]
    pub provider: String,

    /// Vendor finish reason, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The core Provider trait.
///
/// Every vendor adapter implements this trait. The completion manager calls
/// `complete()` without knowing which vendor is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The identity used for health tracking and result tagging (e.g. "openai").
    fn name(&self) -> &str;

    /// The model currently used for requests.
    fn model(&self) -> String;

    /// Send a request and get a complete, normalized reply.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;

    /// Estimate USD cost for the given token counts.
    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64;

    /// Approximate token count for `text`.
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}
