//! Built-in pricing tables for the supported vendors.
//!
//! Prices are in USD per 1 million tokens. Each vendor table has a default
//! tier used when a model is not listed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// One vendor's price list.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPricing>,
    fallback: ModelPricing,
}

impl PriceTable {
    /// An empty table that prices everything at `fallback`.
    pub fn new(fallback: ModelPricing) -> Self {
        Self {
            prices: HashMap::new(),
            fallback,
        }
    }

    /// Add or replace a model's pricing.
    pub fn with(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.prices.insert(model.into(), pricing);
        self
    }

    /// OpenAI chat and reasoning models. Unknown models cost like gpt-5-mini.
    pub fn openai() -> Self {
        let mini = ModelPricing::new(0.25, 2.0);
        Self::new(mini)
            .with("gpt-5", ModelPricing::new(1.25, 10.0))
            .with("gpt-5-mini", mini)
            .with("gpt-5-nano", ModelPricing::new(0.05, 0.40))
            .with("gpt-5-pro", ModelPricing::new(15.0, 120.0))
            .with("gpt-4.1", ModelPricing::new(2.0, 8.0))
            .with("gpt-4.1-mini", ModelPricing::new(0.40, 1.60))
            .with("gpt-4.1-nano", ModelPricing::new(0.10, 0.40))
            .with("gpt-4o", ModelPricing::new(2.5, 10.0))
            .with("gpt-4o-mini", ModelPricing::new(0.15, 0.60))
    }

    /// Gemini models. Unknown models cost like gemini-2.5-flash.
    pub fn gemini() -> Self {
        let flash = ModelPricing::new(0.075, 0.30);
        Self::new(flash)
            .with("gemini-2.5-flash", flash)
            .with("gemini-1.5-pro", ModelPricing::new(1.25, 5.00))
            .with("gemini-1.5-flash", ModelPricing::new(0.075, 0.30))
    }

    /// OpenRouter-routed models. Free-tier models cost nothing.
    pub fn openrouter() -> Self {
        let free = ModelPricing::new(0.0, 0.0);
        Self::new(ModelPricing::new(0.40, 0.40))
            .with("nvidia/llama-3.3-nemotron-super-49b-v1.5", ModelPricing::new(0.40, 0.40))
            .with("meta-llama/llama-3.1-70b-instruct", ModelPricing::new(0.35, 0.40))
            .with("deepseek/deepseek-r1-0528:free", free)
            .with("minimax/minimax-m2:free", free)
            .with("meta-llama/llama-3.3-70b-instruct:free", free)
    }

    /// Resolve pricing for `model`.
    ///
    /// Tries the exact name, then the name without a `:variant` suffix, then
    /// without a trailing `-<digits>` version, and finally the default tier.
    pub fn lookup(&self, model: &str) -> ModelPricing {
        if let Some(p) = self.prices.get(model) {
            return *p;
        }

        let base = model.split_once(':').map_or(model, |(head, _)| head);
        if let Some(p) = self.prices.get(base) {
            return *p;
        }

        if let Some((head, tail)) = base.rsplit_once('-') {
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
                if let Some(p) = self.prices.get(head) {
                    return *p;
                }
            }
        }

        self.fallback
    }

    /// Compute the cost of a call to `model`.
    pub fn cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.lookup(model).cost(input_tokens, output_tokens)
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_pricing_cost() {
        let p = ModelPricing::new(5.0, 15.0);
        // 500 input, 200 output → (500*5 + 200*15) / 1M = 0.0055
        let c = p.cost(500, 200);
        assert!((c - 0.0055).abs() < 1e-10);
    }

    #[test]
    fn openai_known_model_cost() {
        let table = PriceTable::openai();
        let cost = table.cost("gpt-4.1", 1_000_000, 1_000_000);
        assert!((cost - 10.0).abs() < 1e-10);
    }

    #[test]
    fn openai_strips_version_and_variant() {
        let table = PriceTable::openai();
        assert_eq!(table.lookup("gpt-4o-2024"), ModelPricing::new(2.5, 10.0));
        assert_eq!(table.lookup("gpt-4.1-mini:ft-acme"), ModelPricing::new(0.40, 1.60));
    }

    #[test]
    fn unknown_model_uses_default_tier() {
        assert_eq!(PriceTable::openai().lookup("o9-preview"), ModelPricing::new(0.25, 2.0));
        assert_eq!(PriceTable::gemini().lookup("gemini-9"), ModelPricing::new(0.075, 0.30));
        assert_eq!(
            PriceTable::openrouter().lookup("someone/unknown"),
            ModelPricing::new(0.40, 0.40)
        );
    }

    #[test]
    fn openrouter_free_models_cost_nothing() {
        let table = PriceTable::openrouter();
        let cost = table.cost("deepseek/deepseek-r1-0528:free", 50_000, 50_000);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn list_models_sorted() {
        let models = PriceTable::openai().models();
        assert!(models.contains(&"gpt-5".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }
}
