//! Error types for the sleuth domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all sleuth operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of a single completion attempt, or of the whole fallback chain.
///
/// Semantic invalidity (`EmptyContent`, `MissingToolCalls`) is a failure
/// exactly like a transport error: both count against provider health.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0} returned empty content")]
    EmptyContent(String),

    #[error("{0} did not return required tool calls")]
    MissingToolCalls(String),

    #[error("Blocked for safety: {0}")]
    SafetyBlocked(String),

    #[error("Model {0} does not support tool calls")]
    ToolsUnsupported(String),

    #[error(
        "All LLM providers failed. Attempted: {}. Check API keys and network connectivity.",
        attempted.join(", ")
    )]
    AllProvidersFailed { attempted: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool '{tool_name}' timed out after {timeout_secs} seconds")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Trace sink closed")]
    Closed,

    #[error("Trace sink failed: {0}")]
    Sink(String),
}
