//! Consecutive-failure tracking with timed disablement.
//!
//! Shared by the completion manager (keyed by provider name) and the
//! OpenRouter adapter (keyed by model id). Cloning a [`ProviderHealth`]
//! shares the underlying state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// How long a tripped entry stays disabled unless configured otherwise.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Health state for one tracked name.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// When the disablement expires (None = enabled).
    pub disabled_until: Option<Instant>,
}

/// Thread-safe failure tracker.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    entries: Arc<RwLock<HashMap<String, HealthState>>>,
    cooldown: Duration,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether `name` may be tried now. An expired disablement is cleared
    /// here; the failure counter is kept.
    pub async fn is_available(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let Some(state) = entries.get_mut(name) else {
            return true;
        };
        match state.disabled_until {
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                state.disabled_until = None;
                true
            }
            None => true,
        }
    }

    /// Reset the counter and clear any disablement.
    pub async fn record_success(&self, name: &str) {
        let mut entries = self.entries.write().await;
        let state = entries.entry(name.to_string()).or_default();
        state.consecutive_failures = 0;
        state.disabled_until = None;
    }

    /// Count a failure. Once the counter reaches `threshold`, `name` is
    /// disabled for the cooldown. Returns true if this call disabled it.
    pub async fn record_failure(&self, name: &str, threshold: u32) -> bool {
        let mut entries = self.entries.write().await;
        let state = entries.entry(name.to_string()).or_default();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= threshold {
            state.disabled_until = Some(Instant::now() + self.cooldown);
            return true;
        }
        false
    }

    /// Current state of `name` (default if never seen).
    pub async fn state(&self, name: &str) -> HealthState {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_names_are_available() {
        let health = ProviderHealth::new();
        assert!(health.is_available("openai").await);
        assert_eq!(health.state("openai").await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn threshold_disables() {
        let health = ProviderHealth::new();
        assert!(!health.record_failure("gemini", 3).await);
        assert!(!health.record_failure("gemini", 3).await);
        assert!(health.is_available("gemini").await);
        assert!(health.record_failure("gemini", 3).await);
        assert!(!health.is_available("gemini").await);
    }

    #[tokio::test]
    async fn success_resets() {
        let health = ProviderHealth::new();
        health.record_failure("openai", 2).await;
        health.record_failure("openai", 2).await;
        assert!(!health.is_available("openai").await);

        health.record_success("openai").await;
        let state = health.state("openai").await;
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.disabled_until.is_none());
        assert!(health.is_available("openai").await);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires_but_counter_survives() {
        let health = ProviderHealth::new();
        health.record_failure("openai", 2).await;
        health.record_failure("openai", 2).await;
        assert!(!health.is_available("openai").await);

        tokio::time::advance(DEFAULT_COOLDOWN + Duration::from_secs(1)).await;
        assert!(health.is_available("openai").await);
        assert_eq!(health.state("openai").await.consecutive_failures, 2);

        // Next failure trips again immediately
        assert!(health.record_failure("openai", 2).await);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let health = ProviderHealth::new();
        let other = health.clone();
        other.record_failure("x", 1).await;
        assert!(!health.is_available("x").await);
    }
}
