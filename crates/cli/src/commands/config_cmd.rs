//! `sleuth config` shows, initializes or locates the configuration file.

use anyhow::Context;
use sleuth_config::AppConfig;
use std::path::Path;
use std::process::ExitCode;

const REDACTED: &str = "[REDACTED]";

/// A copy of `config` with every API key replaced by a placeholder.
pub fn redacted(config: &AppConfig) -> AppConfig {
    let mut copy = config.clone();
    for slot in [
        &mut copy.llm.openai,
        &mut copy.llm.gemini,
        &mut copy.llm.openrouter,
    ] {
        if let Some(provider) = slot.as_mut()
            && provider.api_key.is_some()
        {
            provider.api_key = Some(REDACTED.into());
        }
    }
    copy
}

pub async fn show(config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

pub async fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<ExitCode> {
    let path = super::config_file(config_path);
    if path.exists() && !force {
        eprintln!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(ExitCode::FAILURE);
    }
    write_default(&path).await?;
    println!("Wrote default config to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

/// Write the default configuration to `path`, creating parent directories.
pub async fn write_default(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, AppConfig::default_toml())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub async fn path(config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    println!("{}", super::config_file(config_path).display());
    Ok(ExitCode::SUCCESS)
}
