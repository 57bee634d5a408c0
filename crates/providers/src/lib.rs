//! Language-model providers for sleuth.
//!
//! Each vendor adapter implements `sleuth_core::Provider`. The
//! [`CompletionManager`] walks them in fallback order and disables
//! providers that keep failing.

pub mod builder;
pub mod gemini;
pub mod health;
pub mod manager;
pub mod openai;
pub mod openrouter;
pub mod wire;

pub use builder::{build_manager, build_provider, resolve_primary};
pub use gemini::GeminiProvider;
pub use health::{HealthState, ProviderHealth};
pub use manager::CompletionManager;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
