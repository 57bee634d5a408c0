//! `sleuth research` runs one session against the configured providers.

use anyhow::Context;
use clap::Args;
use sleuth_agent::ResearcherAgent;
use sleuth_config::AppConfig;
use sleuth_core::research::{ResearchResult, ResearchStatus};
use sleuth_core::trace::{NoopEmitter, TraceEmitter};
use sleuth_providers::{ProviderHealth, build_manager};
use sleuth_telemetry::JsonlTraceWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// The research question
    pub query: String,

    /// Override research.max_iterations
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_iterations: Option<u32>,

    /// Override research.timeout_minutes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_minutes: Option<u64>,

    /// Write the full result as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stream trace events as JSON Lines to this file
    #[arg(long)]
    pub trace: Option<PathBuf>,
}

impl ResearchArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(max) = self.max_iterations {
            config.research.max_iterations = max;
        }
        if let Some(minutes) = self.timeout_minutes {
            config.research.timeout_minutes = minutes;
        }
    }
}

pub async fn run(config_path: Option<&Path>, args: ResearchArgs) -> anyhow::Result<ExitCode> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);

    let manager = build_manager(&config.llm, ProviderHealth::new())
        .context("No usable LLM provider")?;
    let tools = Arc::new(sleuth_tools::offline_registry(&config.tools));
    let emitter: Arc<dyn TraceEmitter> = match &args.trace {
        Some(path) => Arc::new(
            JsonlTraceWriter::create(path)
                .await
                .with_context(|| format!("Failed to open trace file {}", path.display()))?,
        ),
        None => Arc::new(NoopEmitter),
    };

    let agent = ResearcherAgent::new(Arc::new(manager), tools)
        .with_settings(config.research.clone())
        .with_tool_settings(config.tools.clone())
        .with_emitter(emitter);

    let result = agent.research(&args.query, None).await;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Result written");
    }

    println!("{}", render(&result));
    Ok(if is_failure(result.status) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Human-readable summary of a finished session.
pub fn render(result: &ResearchResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Status: {}\n", result.status));
    if let Some(error) = &result.error {
        out.push_str(&format!("Error: {error}\n"));
    }
    out.push_str(&format!(
        "Iterations: {}  Tokens: {}  Cost: ${:.4}  Duration: {:.1}s\n",
        result.total_iterations,
        result.total_tokens,
        result.total_cost_usd,
        result.total_duration_seconds
    ));
    if !result.report.is_empty() {
        out.push('\n');
        out.push_str(result.report.trim_end());
        out.push('\n');
    }
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in result.sources.iter().enumerate() {
            out.push_str(&format!("  [{}] {source}\n", i + 1));
        }
    }
    out
}

/// Failed and timed-out sessions exit non-zero.
pub fn is_failure(status: ResearchStatus) -> bool {
    matches!(status, ResearchStatus::Failed | ResearchStatus::Timeout)
}
