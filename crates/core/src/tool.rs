//! Tool dispatch: the closed set of discovery tools and the connector seam.
//!
//! Tool names coming back from a model are parsed into [`ToolKind`]; an
//! unknown name is a hard error, never a silent no-op. Connectors return a
//! JSON object: `{"status": "success"|"error", ...fields, "notes"?, "pipeline_stats"?}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ToolError;

/// Every tool the research agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Generic web search
    WebSearch,
    /// Scholarly search
    ArxivSearch,
    /// Repository search
    GithubSearch,
    /// Document text extraction
    PdfToText,
    /// Terminal call carrying the report
    Finish,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        Self::WebSearch,
        Self::ArxivSearch,
        Self::GithubSearch,
        Self::PdfToText,
        Self::Finish,
    ];

    /// Discovery tools tracked for domain coverage.
    pub const DISCOVERY: [ToolKind; 3] = [Self::WebSearch, Self::ArxivSearch, Self::GithubSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::ArxivSearch => "arxiv_search",
            Self::GithubSearch => "github_search",
            Self::PdfToText => "pdf_to_text",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// The consumed interface to external tools.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Run `tool` with `arguments` and return its JSON result object.
    async fn execute(
        &self,
        tool: ToolKind,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}

/// A single tool implementation registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which tool this implements.
    fn kind(&self) -> ToolKind;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// A registry of tool implementations keyed by kind.
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool of the same kind.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn get(&self, kind: ToolKind) -> Option<&dyn Tool> {
        self.tools.get(&kind).map(|t| t.as_ref())
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.tools.contains_key(k))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolConnector for ToolRegistry {
    async fn execute(
        &self,
        tool: ToolKind,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let handler = self
            .tools
            .get(&tool)
            .ok_or_else(|| ToolError::NotFound(tool.to_string()))?;
        handler.execute(arguments).await
    }
}
