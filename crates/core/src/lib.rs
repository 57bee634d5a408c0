//! # sleuth core
//!
//! Domain types, traits, and error definitions for the sleuth research agent.
//! Every other crate in the workspace depends inward on this one.
//!
//! The seams live here as traits:
//! - [`Provider`]: one language-model vendor behind a uniform completion shape
//! - [`ToolConnector`]: the external discovery tools the agent drives
//! - [`TraceEmitter`]: the fire-and-forget sink for session trace events

pub mod error;
pub mod message;
pub mod provider;
pub mod research;
pub mod tool;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError, TraceError};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{
    Completion, CompletionRequest, Provider, ProviderKind, ToolChoice, ToolDefinition, Usage,
};
pub use research::{AgentStep, ResearchResult, ResearchStatus};
pub use tool::{Tool, ToolConnector, ToolKind, ToolRegistry};
pub use trace::{NoopEmitter, TraceBus, TraceEvent, TraceEventKind, TraceEmitter};
