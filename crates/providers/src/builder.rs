//! Build the completion manager from configuration.

use sleuth_config::{LlmSettings, ProviderConfig};
use sleuth_core::ProviderKind;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::Provider;
use std::sync::Arc;
use tracing::{info, warn};

use crate::gemini::GeminiProvider;
use crate::health::ProviderHealth;
use crate::manager::CompletionManager;
use crate::openai::OpenAiProvider;
use crate::openrouter::OpenRouterProvider;

/// Instantiate one adapter from its settings.
pub fn build_provider(
    kind: ProviderKind,
    config: &ProviderConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    Ok(match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        ProviderKind::OpenRouter => Arc::new(OpenRouterProvider::from_config(config)?),
    })
}

/// Resolve the primary: the requested one if configured, otherwise the
/// first configured provider.
pub fn resolve_primary(settings: &LlmSettings) -> Result<ProviderKind, ProviderError> {
    let configured = settings.configured();
    if configured.contains(&settings.primary) {
        return Ok(settings.primary);
    }
    let Some(first) = configured.first().copied() else {
        return Err(ProviderError::NotConfigured(
            "No LLM providers configured. Set at least one of OPENAI_API_KEY, GOOGLE_API_KEY, OPENROUTER_API_KEY".into(),
        ));
    };
    warn!(
        requested = %settings.primary,
        using = %first,
        "Requested primary provider not configured; falling back"
    );
    Ok(first)
}

/// Build a manager over every configured provider, in fallback order.
pub fn build_manager(
    settings: &LlmSettings,
    health: ProviderHealth,
) -> Result<CompletionManager, ProviderError> {
    let primary_kind = resolve_primary(settings)?;
    let primary_config = settings
        .provider(primary_kind)
        .ok_or_else(|| ProviderError::NotConfigured(primary_kind.to_string()))?;
    let mut manager = CompletionManager::new(build_provider(primary_kind, primary_config)?, health);

    for kind in &settings.fallback_order {
        if *kind == primary_kind {
            continue;
        }
        match settings.provider(*kind).filter(|c| c.has_api_key()) {
            Some(config) => manager = manager.with_fallback(build_provider(*kind, config)?),
            None => info!(provider = %kind, "Provider not configured, skipping"),
        }
    }

    info!(
        primary = %primary_kind,
        chain = %manager.provider_names().join(" -> "),
        "Completion manager ready"
    );
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(key: &str) -> Option<ProviderConfig> {
        Some(ProviderConfig {
            api_key: Some(key.into()),
            ..ProviderConfig::default()
        })
    }

    #[test]
    fn no_providers_is_not_configured() {
        let settings = LlmSettings::default();
        assert!(matches!(
            resolve_primary(&settings),
            Err(ProviderError::NotConfigured(_))
        ));
        assert!(build_manager(&settings, ProviderHealth::new()).is_err());
    }

    #[test]
    fn unconfigured_primary_falls_back_to_first_configured() {
        let settings = LlmSettings {
            gemini: keyed("g"),
            openrouter: keyed("o"),
            ..LlmSettings::default()
        };
        assert_eq!(resolve_primary(&settings).unwrap(), ProviderKind::Gemini);

        let manager = build_manager(&settings, ProviderHealth::new()).unwrap();
        assert_eq!(manager.provider_names(), vec!["gemini", "openrouter"]);
    }

    #[test]
    fn chain_follows_fallback_order() {
        let settings = LlmSettings {
            primary: ProviderKind::OpenRouter,
            fallback_order: vec![ProviderKind::OpenRouter, ProviderKind::OpenAi, ProviderKind::Gemini],
            openai: keyed("sk"),
            gemini: Some(ProviderConfig::default()),
            openrouter: keyed("o"),
        };
        let manager = build_manager(&settings, ProviderHealth::new()).unwrap();
        assert_eq!(manager.provider_names(), vec!["openrouter", "openai"]);
        assert_eq!(manager.primary_name(), "openrouter");
    }
}
