//! Research tools for sleuth.
//!
//! Holds the function definitions the model is offered and deterministic
//! offline implementations of every discovery tool. Network-backed
//! connectors plug in through [`sleuth_core::ToolConnector`].

pub mod definitions;
pub mod offline;

use sleuth_config::ToolSettings;
use sleuth_core::tool::ToolRegistry;

pub use definitions::{all_definitions, definition};
pub use offline::{OfflineArxivSearch, OfflineGithubSearch, OfflinePdfToText, OfflineWebSearch};

/// Create a registry with every offline tool, sized from `settings`.
pub fn offline_registry(settings: &ToolSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(OfflineWebSearch::new(settings.web_search_max_results)));
    registry.register(Box::new(OfflineArxivSearch::new(settings.arxiv_max_results)));
    registry.register(Box::new(OfflineGithubSearch::new(settings.github_max_results)));
    registry.register(Box::new(OfflinePdfToText::new(settings.pdf_max_pages)));
    registry
}

/// Create an offline registry with default limits.
pub fn default_registry() -> ToolRegistry {
    offline_registry(&ToolSettings::default())
}
