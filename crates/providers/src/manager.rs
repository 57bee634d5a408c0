//! Completion manager: ordered provider fallback with circuit breaking.
//!
//! Each request walks `[primary, fallbacks...]`, skipping disabled
//! providers. An attempt succeeds only if the reply is semantically usable
//! for the request; anything else counts against the provider. The primary
//! trips after 2 consecutive failures, fallbacks after 3.

use sleuth_core::error::ProviderError;
use sleuth_core::provider::*;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::health::ProviderHealth;

/// Consecutive failures before the primary is disabled.
pub const PRIMARY_FAILURE_THRESHOLD: u32 = 2;
/// Consecutive failures before a fallback is disabled.
pub const FALLBACK_FAILURE_THRESHOLD: u32 = 3;

pub struct CompletionManager {
    /// Index 0 is the primary.
    chain: Vec<Arc<dyn Provider>>,
    health: ProviderHealth,
}

impl CompletionManager {
    pub fn new(primary: Arc<dyn Provider>, health: ProviderHealth) -> Self {
        Self {
            chain: vec![primary],
            health,
        }
    }

    /// Append a fallback. Providers already in the chain are ignored.
    pub fn with_fallback(mut self, provider: Arc<dyn Provider>) -> Self {
        if self.chain.iter().all(|p| p.name() != provider.name()) {
            self.chain.push(provider);
        }
        self
    }

    pub fn primary(&self) -> &Arc<dyn Provider> {
        &self.chain[0]
    }

    pub fn primary_name(&self) -> &str {
        self.chain[0].name()
    }

    /// Provider names in attempt order.
    pub fn provider_names(&self) -> Vec<String> {
        self.chain.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn health(&self) -> &ProviderHealth {
        &self.health
    }

    /// Cost estimate on the primary's price table.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.primary().estimate_cost(input_tokens, output_tokens)
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.primary().count_tokens(text)
    }

    /// Run `request` through the chain and return the first valid reply.
    ///
    /// The returned completion's `provider` names whoever served it.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let primary = self.primary_name().to_string();
        if !self.health.is_available(&primary).await {
            warn!(provider = %primary, "Primary provider temporarily disabled");
        }

        let total = self.chain.len();
        let mut attempted: Vec<String> = Vec::new();

        for (i, provider) in self.chain.iter().enumerate() {
            let name = provider.name();
            let is_primary = i == 0;

            if !self.health.is_available(name).await {
                warn!(provider = %name, "Provider disabled due to repeated failures; skipping");
                continue;
            }

            attempted.push(name.to_string());
            info!(
                provider = %name,
                attempt = i + 1,
                total,
                "Completion: trying provider"
            );

            let outcome = provider
                .complete(request.clone())
                .await
                .and_then(|completion| validate(name, &request, completion));

            match outcome {
                Ok(mut completion) => {
                    self.health.record_success(name).await;
                    completion.provider = name.to_string();
                    if is_primary {
                        info!(provider = %name, "Successfully completed with primary provider");
                    } else {
                        info!(provider = %name, primary = %primary, "Successfully fell back");
                    }
                    return Ok(completion);
                }
                Err(e) => {
                    let threshold = if is_primary {
                        PRIMARY_FAILURE_THRESHOLD
                    } else {
                        FALLBACK_FAILURE_THRESHOLD
                    };
                    let disabled = self.health.record_failure(name, threshold).await;
                    warn!(
                        provider = %name,
                        primary = is_primary,
                        error = %e,
                        "Completion: provider failed, trying next"
                    );
                    if disabled {
                        warn!(
                            provider = %name,
                            cooldown_secs = self.health.cooldown().as_secs(),
                            "Disabling provider after repeated failures"
                        );
                    }
                }
            }
        }

        let err = ProviderError::AllProvidersFailed { attempted };
        error!(error = %err, "Completion failed on every provider");
        Err(err)
    }
}

/// Apply the request's semantic requirements to a reply.
fn validate(
    name: &str,
    request: &CompletionRequest,
    completion: Completion,
) -> Result<Completion, ProviderError> {
    if request.require_content && !completion.has_content() {
        return Err(ProviderError::EmptyContent(name.to_string()));
    }
    if request.require_tool_calls && !request.tools.is_empty() && !completion.has_tool_calls() {
        return Err(ProviderError::MissingToolCalls(name.to_string()));
    }
    Ok(completion)
}
