//! Function definitions offered to the model for every research tool.

use serde_json::json;
use sleuth_core::provider::ToolDefinition;
use sleuth_core::tool::ToolKind;

/// The definition the model sees for `kind`.
pub fn definition(kind: ToolKind) -> ToolDefinition {
    match kind {
        ToolKind::WebSearch => ToolDefinition {
            name: kind.to_string(),
            description: "Search the web for current information, news, articles, and general \
                knowledge. Best for recent events, trends, and practical information. \
                Returns up to 20 results."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query. Be specific and use keywords."
                    },
                    "num_results": {
                        "type": "integer",
                        "description": "Number of results to return (1-20)",
                        "default": 10,
                        "minimum": 1,
                        "maximum": 20
                    },
                    "date_filter": {
                        "type": "string",
                        "enum": ["day", "week", "month", "year", null],
                        "description": "Filter by recency. Use for time-sensitive queries.",
                        "default": null
                    }
                },
                "required": ["query"]
            }),
        },
        ToolKind::ArxivSearch => ToolDefinition {
            name: kind.to_string(),
            description: "Search academic papers on ArXiv. Best for research papers, ML/AI \
                topics, physics, math, and computer science. Returns paper metadata and abstracts."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query. Use technical terms."
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum papers to return (1-50)",
                        "default": 20,
                        "minimum": 1,
                        "maximum": 50
                    },
                    "sort_by": {
                        "type": "string",
                        "enum": ["relevance", "lastUpdatedDate", "submittedDate"],
                        "description": "Sort order for results",
                        "default": "relevance"
                    },
                    "date_from": {
                        "type": "string",
                        "description": "Filter papers from this date (YYYY-MM-DD)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolKind::GithubSearch => ToolDefinition {
            name: kind.to_string(),
            description: "Search GitHub for repositories, code, or users. Best for finding \
                implementations, libraries, and open-source projects."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query. Use project names or keywords."
                    },
                    "search_type": {
                        "type": "string",
                        "enum": ["repositories", "code", "users"],
                        "description": "What to search for",
                        "default": "repositories"
                    },
                    "sort": {
                        "type": "string",
                        "enum": ["stars", "forks", "updated"],
                        "description": "Sort order (repositories only)",
                        "default": "stars"
                    },
                    "language": {
                        "type": "string",
                        "description": "Filter by language (e.g., 'Python', 'JavaScript')"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Number of results (1-30)",
                        "default": 10,
                        "minimum": 1,
                        "maximum": 30
                    }
                },
                "required": ["query"]
            }),
        },
        ToolKind::PdfToText => ToolDefinition {
            name: kind.to_string(),
            description: "Extract text from PDF documents. Use when you find a relevant PDF \
                paper or document that you need to read. Returns structured text content."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "PDF URL (https://...) or file path"
                    },
                    "max_pages": {
                        "type": "integer",
                        "description": "Maximum pages to extract (default: 50)",
                        "default": 50,
                        "minimum": 1,
                        "maximum": 200
                    }
                },
                "required": ["source"]
            }),
        },
        ToolKind::Finish => ToolDefinition {
            name: kind.to_string(),
            description: "Call this only after you have gathered enough high-quality evidence \
                to craft the final Deep Research Report. The output should be a detailed \
                narrative that adapts the section structure to the query, mixes prose with \
                tables/bullets, and documents how evidence was gathered."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "report": {
                        "type": "string",
                        "description": FINISH_REPORT_DESCRIPTION
                    },
                    "sources": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Ordered list of source URLs cited in the report (matches [#] references)."
                    },
                    "confidence": {
                        "type": "number",
                        "description": "Confidence in the report's completeness (0-1).",
                        "default": 0.8,
                        "minimum": 0,
                        "maximum": 1
                    }
                },
                "required": ["report", "sources"]
            }),
        },
    }
}

const FINISH_REPORT_DESCRIPTION: &str = "Comprehensive Markdown Deep Research Report (>=600 words) with adaptive structure:\n\
1. # {Topic Title}\n\
2. ## TL;DR - 4-6 bullet takeaways with quantified facts when possible.\n\
3. ## Methodology & Evidence Quality - summarize tools/sources, recency filters, and explicitly state a Coverage gaps & confidence clause.\n\
4. ## Key Facts - table or bullet list of the most critical quantitative facts tailored to the topic.\n\
5. ## Findings & Analysis - create topic-appropriate sections (### ...) across business, technical, policy, societal, academic, political, or cultural angles.\n\
6. ## Implementation / Impact - deployments, market traction, costs, or architecture as relevant.\n\
7. ## Gaps & Open Questions - highlight missing data or research needs.\n\
8. ## Recommended Next Steps - actionable guidance for decision-makers.\n\
Do not include a Sources section in the report body; sources are supplied separately via the structured sources field.";

/// Definitions for every tool, in declaration order.
pub fn all_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_definitions_named_after_kinds() {
        let defs = all_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["web_search", "arxiv_search", "github_search", "pdf_to_text", "finish"]
        );
    }

    #[test]
    fn required_fields() {
        assert_eq!(definition(ToolKind::WebSearch).parameters["required"], json!(["query"]));
        assert_eq!(definition(ToolKind::PdfToText).parameters["required"], json!(["source"]));
        assert_eq!(
            definition(ToolKind::Finish).parameters["required"],
            json!(["report", "sources"])
        );
    }

    #[test]
    fn every_description_is_present() {
        for def in all_definitions() {
            assert!(!def.description.is_empty(), "{} has no description", def.name);
            assert_eq!(def.parameters["type"], "object");
        }
    }
}
