//! `sleuth providers` lists LLM providers in the order they are attempted.

use sleuth_config::LlmSettings;
use sleuth_core::ProviderKind;
use sleuth_providers::{build_provider, resolve_primary};
use std::path::Path;
use std::process::ExitCode;

/// Configured providers in attempt order: the resolved primary first,
/// then `fallback_order` entries that have credentials.
pub fn attempt_order(settings: &LlmSettings) -> Vec<ProviderKind> {
    let Ok(primary) = resolve_primary(settings) else {
        return Vec::new();
    };
    let configured = settings.configured();
    let mut order = vec![primary];
    for kind in &settings.fallback_order {
        if configured.contains(kind) && !order.contains(kind) {
            order.push(*kind);
        }
    }
    order
}

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = super::load_config(config_path)?;
    let order = attempt_order(&config.llm);

    println!("LLM providers (attempt order)");
    println!("=============================");
    if order.is_empty() {
        println!("  none configured");
        println!();
        println!("  Set OPENAI_API_KEY, GOOGLE_API_KEY or OPENROUTER_API_KEY,");
        println!("  or add an [llm.<provider>] block with api_key to the config file.");
        return Ok(ExitCode::FAILURE);
    }

    for (i, kind) in order.iter().enumerate() {
        let role = if i == 0 { "primary" } else { "fallback" };
        let model = config
            .llm
            .provider(*kind)
            .map(|c| match build_provider(*kind, c) {
                Ok(provider) => provider.model(),
                Err(e) => format!("unavailable: {e}"),
            })
            .unwrap_or_default();
        println!("  {}. {:<11} {:<9} {model}", i + 1, kind.as_str(), role);
    }

    let missing: Vec<&str> = ProviderKind::ALL
        .iter()
        .filter(|k| !order.contains(k))
        .map(|k| k.as_str())
        .collect();
    if !missing.is_empty() {
        println!();
        println!("  Not configured: {}", missing.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_config::ProviderConfig;

    fn with_key() -> Option<ProviderConfig> {
        Some(ProviderConfig {
            api_key: Some("k".into()),
            ..ProviderConfig::default()
        })
    }

    #[test]
    fn primary_leads_then_configured_fallbacks() {
        let settings = LlmSettings {
            primary: ProviderKind::OpenRouter,
            fallback_order: vec![ProviderKind::OpenAi, ProviderKind::Gemini],
            openai: with_key(),
            openrouter: with_key(),
            ..LlmSettings::default()
        };
        assert_eq!(
            attempt_order(&settings),
            vec![ProviderKind::OpenRouter, ProviderKind::OpenAi]
        );
    }

    #[test]
    fn providers_outside_fallback_order_are_not_attempted() {
        let settings = LlmSettings {
            primary: ProviderKind::OpenRouter,
            openai: with_key(),
            openrouter: with_key(),
            ..LlmSettings::default()
        };
        assert_eq!(attempt_order(&settings), vec![ProviderKind::OpenRouter]);
    }

    #[test]
    fn unconfigured_primary_is_replaced() {
        let settings = LlmSettings {
            gemini: with_key(),
            ..LlmSettings::default()
        };
        assert_eq!(attempt_order(&settings), vec![ProviderKind::Gemini]);
    }

    #[test]
    fn nothing_configured_yields_empty_order() {
        assert!(attempt_order(&LlmSettings::default()).is_empty());
    }
}
