//! Tool-use policy: per-session gating of specialized discovery tools.
//!
//! Allow flags are derived from the query once. A gated tool is let through
//! when its flag is set, after one denial (a single grace retry), or when
//! the current reasoning names a need for it. Sparse web results earn one
//! refinement hint per distinct query string.

use sleuth_core::tool::ToolKind;
use std::collections::HashMap;
use tracing::info;

const GITHUB_KEYWORDS: &[&str] = &[
    "implementation",
    "implementations",
    "library",
    "libraries",
    "repo",
    "repos",
    "repository",
    "repositories",
    "code",
    "codes",
    "tool",
    "tools",
    "application",
    "applications",
    "framework",
    "frameworks",
    "sdk",
    "benchmark",
    "benchmarks",
    "open source",
    "open-source",
    "github",
];

const ARXIV_KEYWORDS: &[&str] = &[
    "paper",
    "papers",
    "research",
    "study",
    "studies",
    "academic",
    "arxiv",
    "preprint",
    "pre-print",
    "theory",
    "algorithm",
    "algorithms",
    "proof",
    "methodology",
    "evaluation",
    "neural",
    "model",
    "models",
    "dataset",
    "datasets",
    "science",
    "scientific",
    "physics",
    "math",
    "mathematics",
    "statistical",
    "statistics",
    "ml",
    "ai",
    "artificial intelligence",
    "deep learning",
    "machine learning",
    "generative ai",
    "rag",
    "llm",
    "data science",
];

/// Signals that open both specialized tools at once.
const TECHNICAL_SIGNALS: &[&str] = &[
    "ai",
    "ml",
    "machine learning",
    "deep learning",
    "data science",
    "rag",
    "retrieval augmented",
    "neural",
    "model",
    "algorithm",
];

const HISTORICAL_SIGNALS: &[&str] = &["history", "timeline", "origin", "evolution", "since", "from "];

pub const GITHUB_BLOCKED: &str = "Tool routing heuristic: stay on web_search or arxiv_search until \
you discover a concrete need for code repositories, implementations, libraries, or benchmarks.";

pub const ARXIV_BLOCKED: &str = "Tool routing heuristic: this topic has not been identified as \
academic yet. Gather more context via web_search unless you uncover explicit scholarly cues.";

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// How time-sensitive a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyIntent {
    Fresh,
    Historical,
    General,
}

impl RecencyIntent {
    /// Classify `query`; `current_year` counts as a freshness signal.
    pub fn detect(query: &str, current_year: &str) -> Self {
        let q = query.to_lowercase();
        let fresh = [
            "latest",
            "recent",
            "202",
            current_year,
            "today",
            "this year",
            "upcoming",
            "roadmap",
            "forecast",
            "trend",
        ];
        if contains_any(&q, &fresh) {
            Self::Fresh
        } else if contains_any(&q, HISTORICAL_SIGNALS) {
            Self::Historical
        } else {
            Self::General
        }
    }

    /// Date filter applied to web searches that do not set one.
    pub fn preferred_date_filter(&self) -> Option<&'static str> {
        match self {
            Self::Fresh => Some("month"),
            _ => None,
        }
    }
}

/// Per-session gating state.
#[derive(Debug, Clone)]
pub struct ToolPolicy {
    pub allow_github: bool,
    pub allow_arxiv: bool,
    pub default_tool: ToolKind,
    pub sufficient_result_count: usize,
    pub sparse_result_threshold: usize,
    pub recency: RecencyIntent,
    denials: HashMap<ToolKind, u32>,
    evidence_sufficient: bool,
    last_sparse_query: Option<String>,
}

impl ToolPolicy {
    /// Derive the initial policy from the query text.
    pub fn derive(query: &str, current_year: &str) -> Self {
        let text = query.to_lowercase();
        let technical = contains_any(&text, TECHNICAL_SIGNALS);
        let allow_github = technical || contains_any(&text, GITHUB_KEYWORDS);
        let allow_arxiv = technical || contains_any(&text, ARXIV_KEYWORDS);

        Self {
            allow_github,
            allow_arxiv,
            default_tool: if allow_arxiv && !allow_github {
                ToolKind::ArxivSearch
            } else {
                ToolKind::WebSearch
            },
            sufficient_result_count: if allow_arxiv { 5 } else { 4 },
            sparse_result_threshold: 2,
            recency: RecencyIntent::detect(query, current_year),
            denials: HashMap::new(),
            evidence_sufficient: false,
            last_sparse_query: None,
        }
    }

    pub fn with_sufficient_result_count(mut self, count: Option<usize>) -> Self {
        if let Some(count) = count {
            self.sufficient_result_count = count;
        }
        self
    }

    pub fn with_sparse_result_threshold(mut self, threshold: usize) -> Self {
        self.sparse_result_threshold = threshold;
        self
    }

    /// The routing message injected after the kickoff turn.
    pub fn routing_message(&self) -> String {
        let mut hints = vec!["Tool routing guidance: default to web_search for broad discovery."];
        match self.recency {
            RecencyIntent::Fresh => hints.push(
                "This topic appears time-sensitive. Prefer web_search with date_filter='week' or \
                 'month' to capture the latest developments before using other tools.",
            ),
            RecencyIntent::Historical => hints.push(
                "This topic reads as historical; avoid forcing recency filters unless explicitly \
                 requested and focus on core context.",
            ),
            RecencyIntent::General => {}
        }
        if self.default_tool == ToolKind::ArxivSearch {
            hints.push(
                "The topic reads as academic, so consider starting with arxiv_search before \
                 general web coverage.",
            );
        }
        if !self.allow_github {
            hints.push(
                "Skip github_search unless you explicitly see references to implementations, \
                 repositories, benchmarks, or SDKs.",
            );
        }
        if !self.allow_arxiv {
            hints.push(
                "Use arxiv_search only if later evidence shows a clear need for scholarly or \
                 scientific sources.",
            );
        }
        hints.join(" ")
    }

    /// Decide whether `tool` may run given the reasoning that requested it.
    ///
    /// Returns the block message when it may not.
    pub fn gate(&mut self, tool: ToolKind, thought: &str) -> Result<(), &'static str> {
        let (allowed, keywords, blocked) = match tool {
            ToolKind::GithubSearch => (self.allow_github, GITHUB_KEYWORDS, GITHUB_BLOCKED),
            ToolKind::ArxivSearch => (self.allow_arxiv, ARXIV_KEYWORDS, ARXIV_BLOCKED),
            _ => return Ok(()),
        };
        if allowed || self.denials(tool) >= 1 {
            return Ok(());
        }
        if contains_any(&thought.to_lowercase(), keywords) {
            match tool {
                ToolKind::GithubSearch => self.allow_github = true,
                _ => self.allow_arxiv = true,
            }
            return Ok(());
        }
        *self.denials.entry(tool).or_default() += 1;
        Err(blocked)
    }

    pub fn denials(&self, tool: ToolKind) -> u32 {
        self.denials.get(&tool).copied().unwrap_or(0)
    }

    pub fn evidence_sufficient(&self) -> bool {
        self.evidence_sufficient
    }

    /// Mark early evidence as sufficient when a discovery tool returns
    /// enough results within the first three iterations.
    pub fn observe_result_count(&mut self, tool: ToolKind, count: usize, iteration: u32) {
        if self.evidence_sufficient {
            return;
        }
        let min_results = self.sufficient_result_count.max(3);
        let counts_toward = tool == self.default_tool
            || matches!(tool, ToolKind::WebSearch | ToolKind::ArxivSearch);
        if count >= min_results && iteration <= 3 && counts_toward {
            self.evidence_sufficient = true;
            info!(tool = %tool, count, "Early evidence threshold met; domain coverage nudges disabled.");
        }
    }

    /// A refinement hint for a sparse web search, at most once per query string.
    pub fn sparse_hint(&mut self, query: Option<&str>, count: usize) -> Option<String> {
        let threshold = self.sparse_result_threshold.max(1);
        let query = query.map(str::trim).filter(|q| !q.is_empty())?;
        if count > threshold || self.last_sparse_query.as_deref() == Some(query) {
            return None;
        }
        self.last_sparse_query = Some(query.to_string());

        let mut hint = format!(
            "Web search for \"{query}\" returned only {count} relevant results. Refine the query \
             with more specific keywords, synonyms, recency filters, or site/domain operators and \
             run web_search again before moving on."
        );
        match self.recency {
            RecencyIntent::Fresh => hint.push_str(
                " Because the topic is time-sensitive, try setting date_filter='week' or 'month' \
                 or adding words like 'latest'/'2025' if explicitly required.",
            ),
            RecencyIntent::Historical => hint.push_str(
                " Stick with the historical framing; avoid forcing current-year filters unless specified.",
            ),
            RecencyIntent::General => {}
        }
        Some(hint)
    }
}

/// Successful uses of the discovery tools, for coverage reminders.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    counts: HashMap<ToolKind, u32>,
    last_reminded: Option<Vec<ToolKind>>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tool: ToolKind, success: bool) {
        if success && ToolKind::DISCOVERY.contains(&tool) {
            *self.counts.entry(tool).or_default() += 1;
            self.last_reminded = None;
        }
    }

    pub fn count(&self, tool: ToolKind) -> u32 {
        self.counts.get(&tool).copied().unwrap_or(0)
    }

    pub fn missing(&self) -> Vec<ToolKind> {
        ToolKind::DISCOVERY
            .into_iter()
            .filter(|t| self.count(*t) == 0)
            .collect()
    }

    /// The reminder to inject now, if any. Each distinct missing set is
    /// reminded once until a success changes it.
    pub fn reminder(&mut self, evidence_sufficient: bool) -> Option<String> {
        let missing = self.missing();
        if evidence_sufficient || missing.is_empty() {
            self.last_reminded = None;
            return None;
        }
        if self.last_reminded.as_ref() == Some(&missing) {
            return None;
        }
        let names: Vec<&str> = missing.iter().map(ToolKind::as_str).collect();
        let text = crate::prompts::coverage_reminder(&names);
        self.last_reminded = Some(missing);
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_query_gates_specialized_tools() {
        let policy = ToolPolicy::derive("how bees navigate", "2026");
        assert!(!policy.allow_github);
        assert!(!policy.allow_arxiv);
        assert_eq!(policy.default_tool, ToolKind::WebSearch);
        assert_eq!(policy.sufficient_result_count, 4);
        assert_eq!(policy.recency, RecencyIntent::General);

        let message = policy.routing_message();
        assert!(message.starts_with("Tool routing guidance: default to web_search"));
        assert!(message.contains("Skip github_search"));
        assert!(message.contains("Use arxiv_search only if"));
    }

    #[test]
    fn technical_query_allows_everything() {
        let policy = ToolPolicy::derive("retrieval augmented generation evaluation", "2026");
        assert!(policy.allow_github);
        assert!(policy.allow_arxiv);
        assert_eq!(policy.default_tool, ToolKind::WebSearch);
        assert_eq!(policy.sufficient_result_count, 5);
    }

    #[test]
    fn scholarly_query_defaults_to_arxiv() {
        let policy = ToolPolicy::derive("theory of quantum chromodynamics papers", "2026");
        assert!(policy.allow_arxiv);
        assert!(!policy.allow_github);
        assert_eq!(policy.default_tool, ToolKind::ArxivSearch);
        assert!(policy.routing_message().contains("consider starting with arxiv_search"));
    }

    #[test]
    fn recency_classification() {
        assert_eq!(RecencyIntent::detect("latest X trends", "2026"), RecencyIntent::Fresh);
        assert_eq!(RecencyIntent::detect("outlook for 2026", "2026"), RecencyIntent::Fresh);
        assert_eq!(
            RecencyIntent::detect("history of the printing press", "2026"),
            RecencyIntent::Historical
        );
        assert_eq!(RecencyIntent::detect("how bees navigate", "2026"), RecencyIntent::General);
        assert_eq!(RecencyIntent::Fresh.preferred_date_filter(), Some("month"));
        assert_eq!(RecencyIntent::General.preferred_date_filter(), None);
    }

    #[test]
    fn gated_tool_gets_one_grace_denial() {
        let mut policy = ToolPolicy::derive("how bees navigate", "2026");
        assert_eq!(policy.gate(ToolKind::GithubSearch, "let me look"), Err(GITHUB_BLOCKED));
        assert_eq!(policy.denials(ToolKind::GithubSearch), 1);
        assert_eq!(policy.gate(ToolKind::GithubSearch, "let me look"), Ok(()));
        assert_eq!(policy.gate(ToolKind::GithubSearch, "again"), Ok(()));
        assert_eq!(policy.denials(ToolKind::GithubSearch), 1);
    }

    #[test]
    fn reasoning_can_earn_a_tool() {
        let mut policy = ToolPolicy::derive("how bees navigate", "2026");
        assert_eq!(
            policy.gate(ToolKind::ArxivSearch, "A peer-reviewed study would help here"),
            Ok(())
        );
        assert!(policy.allow_arxiv);
        assert_eq!(policy.denials(ToolKind::ArxivSearch), 0);
    }

    #[test]
    fn ungated_tools_always_pass() {
        let mut policy = ToolPolicy::derive("how bees navigate", "2026");
        for tool in [ToolKind::WebSearch, ToolKind::PdfToText, ToolKind::Finish] {
            assert_eq!(policy.gate(tool, ""), Ok(()));
        }
    }

    #[test]
    fn sparse_hint_once_per_query() {
        let mut policy = ToolPolicy::derive("latest X trends", "2026");
        let hint = policy.sparse_hint(Some("latest X trends"), 1).unwrap();
        assert!(hint.starts_with("Web search for \"latest X trends\" returned only 1 relevant results."));
        assert!(hint.contains("time-sensitive"));
        assert!(policy.sparse_hint(Some("latest X trends"), 1).is_none());
        assert!(policy.sparse_hint(Some("latest X trends 2026"), 0).is_some());
    }

    #[test]
    fn sparse_hint_respects_threshold() {
        let mut policy = ToolPolicy::derive("how bees navigate", "2026");
        assert!(policy.sparse_hint(Some("bees"), 3).is_none());
        assert!(policy.sparse_hint(None, 0).is_none());
        assert!(policy.sparse_hint(Some("  "), 0).is_none());

        let mut policy = policy.with_sparse_result_threshold(0);
        assert!(policy.sparse_hint(Some("bees"), 2).is_none());
        assert!(policy.sparse_hint(Some("bees"), 1).is_some());
    }

    #[test]
    fn sufficiency_needs_early_rich_results() {
        let mut policy = ToolPolicy::derive("how bees navigate", "2026");
        policy.observe_result_count(ToolKind::WebSearch, 4, 4);
        assert!(!policy.evidence_sufficient());
        policy.observe_result_count(ToolKind::GithubSearch, 10, 1);
        assert!(!policy.evidence_sufficient());
        policy.observe_result_count(ToolKind::WebSearch, 4, 2);
        assert!(policy.evidence_sufficient());
    }

    #[test]
    fn sufficiency_floor_is_three() {
        let mut policy =
            ToolPolicy::derive("how bees navigate", "2026").with_sufficient_result_count(Some(1));
        policy.observe_result_count(ToolKind::WebSearch, 2, 1);
        assert!(!policy.evidence_sufficient());
        policy.observe_result_count(ToolKind::WebSearch, 3, 1);
        assert!(policy.evidence_sufficient());
    }

    #[test]
    fn coverage_reminds_once_per_missing_set() {
        let mut coverage = Coverage::new();
        let first = coverage.reminder(false).unwrap();
        assert!(first.contains("web_search, arxiv_search, github_search"));
        assert!(coverage.reminder(false).is_none());

        coverage.record(ToolKind::WebSearch, true);
        let second = coverage.reminder(false).unwrap();
        assert!(second.contains("arxiv_search, github_search"));
        assert!(!second.contains("web_search"));

        coverage.record(ToolKind::PdfToText, true);
        coverage.record(ToolKind::ArxivSearch, false);
        assert!(coverage.reminder(false).is_none());
        assert!(coverage.reminder(true).is_none());
    }
}
