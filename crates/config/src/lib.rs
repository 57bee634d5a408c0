//! Configuration loading, validation, and management for sleuth.
//!
//! Loads configuration from `~/.sleuth/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! String values written as `${VAR}` or `${VAR:default}` are expanded from
//! the environment when the file is loaded; a `${VAR}` whose variable is
//! unset removes the key, so optional secrets can live in the file safely.

use serde::{Deserialize, Serialize};
use sleuth_core::ProviderKind;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sleuth/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model providers and their attempt order
    #[serde(default)]
    pub llm: LlmSettings,

    /// Agent loop settings
    #[serde(default)]
    pub research: ResearchSettings,

    /// Tool timeouts and result limits
    #[serde(default)]
    pub tools: ToolSettings,
}

/// Provider selection and per-vendor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider tried first
    #[serde(default = "default_primary")]
    pub primary: ProviderKind,

    /// Providers tried after the primary, in order
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<ProviderKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<ProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<ProviderConfig>,
}

fn default_primary() -> ProviderKind {
    ProviderKind::OpenAi
}
fn default_fallback_order() -> Vec<ProviderKind> {
    vec![ProviderKind::Gemini, ProviderKind::OpenRouter]
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback_order: default_fallback_order(),
            openai: None,
            gemini: None,
            openrouter: None,
        }
    }
}

impl LlmSettings {
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        match kind {
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::OpenRouter => self.openrouter.as_ref(),
        }
    }

    fn provider_mut(&mut self, kind: ProviderKind) -> &mut Option<ProviderConfig> {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::OpenRouter => &mut self.openrouter,
        }
    }

    /// Providers that have credentials, in declaration order.
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.provider(*kind).is_some_and(ProviderConfig::has_api_key))
            .collect()
    }
}

/// Settings for one provider.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the vendor's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,

    /// Reasoning effort for reasoning models ("low", "medium", "high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Extra models tried after `model` (OpenRouter only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_models: Vec<String>,
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

const REASONING_EFFORTS: [&str; 4] = ["minimal", "low", "medium", "high"];

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("alternate_models", &self.alternate_models)
            .finish()
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Session wall-clock budget
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,

    /// Reasoning temperature; clamped into 0..=1 when used
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_true")]
    pub finish_guard_enabled: bool,

    #[serde(default = "default_true")]
    pub finish_guard_retry_on_auto_finish: bool,

    /// A web search at or below this many results triggers a refinement hint
    #[serde(default = "default_sparse_result_threshold")]
    pub sparse_result_threshold: usize,

    /// Override the query-derived count that marks early evidence as sufficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sufficient_result_count: Option<usize>,

    /// Map typographic punctuation in injected prompts to ASCII
    #[serde(default = "default_true")]
    pub ascii_prompts: bool,
}

fn default_max_iterations() -> u32 {
    6
}
fn default_timeout_minutes() -> u64 {
    15
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_sparse_result_threshold() -> usize {
    2
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_minutes: default_timeout_minutes(),
            temperature: default_temperature(),
            finish_guard_enabled: true,
            finish_guard_retry_on_auto_finish: true,
            sparse_result_threshold: default_sparse_result_threshold(),
            sufficient_result_count: None,
            ascii_prompts: true,
        }
    }
}

impl ResearchSettings {
    pub fn effective_temperature(&self) -> f32 {
        self.temperature.clamp(0.0, 1.0)
    }
}

/// Tool timeouts and result limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Timeout for web_search; 0 disables it
    #[serde(default = "default_web_search_timeout")]
    pub web_search_timeout_seconds: u64,

    /// Timeout for every other tool; 0 disables it
    #[serde(default = "default_tool_timeout")]
    pub tool_execution_timeout_seconds: u64,

    #[serde(default = "default_web_search_max_results")]
    pub web_search_max_results: usize,

    #[serde(default = "default_arxiv_max_results")]
    pub arxiv_max_results: usize,

    #[serde(default = "default_github_max_results")]
    pub github_max_results: usize,

    #[serde(default = "default_pdf_max_pages")]
    pub pdf_max_pages: usize,
}

fn default_web_search_timeout() -> u64 {
    90
}
fn default_tool_timeout() -> u64 {
    60
}
fn default_web_search_max_results() -> usize {
    10
}
fn default_arxiv_max_results() -> usize {
    20
}
fn default_github_max_results() -> usize {
    10
}
fn default_pdf_max_pages() -> usize {
    50
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            web_search_timeout_seconds: default_web_search_timeout(),
            tool_execution_timeout_seconds: default_tool_timeout(),
            web_search_max_results: default_web_search_max_results(),
            arxiv_max_results: default_arxiv_max_results(),
            github_max_results: default_github_max_results(),
            pdf_max_pages: default_pdf_max_pages(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sleuth/config.toml).
    ///
    /// Environment variables override the file:
    /// - `OPENAI_API_KEY`, `GOOGLE_API_KEY` / `GEMINI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `SLEUTH_PRIMARY_PROVIDER`, `SLEUTH_MAX_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content, |key| std::env::var(key).ok()).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse TOML text, expanding `${VAR}` placeholders through `lookup`.
    pub fn from_toml_str(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let parse_error = |reason: String| ConfigError::ParseError {
            path: PathBuf::new(),
            reason,
        };
        let raw: toml::Value = toml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let expanded = expand_placeholders(raw, &lookup).unwrap_or(toml::Value::Table(Default::default()));
        let config: Self = expanded.try_into().map_err(|e: toml::de::Error| parse_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let keys: [(ProviderKind, &[&str]); 3] = [
            (ProviderKind::OpenAi, &["OPENAI_API_KEY"]),
            (ProviderKind::Gemini, &["GOOGLE_API_KEY", "GEMINI_API_KEY"]),
            (ProviderKind::OpenRouter, &["OPENROUTER_API_KEY"]),
        ];
        for (kind, vars) in keys {
            let Some(key) = vars.iter().find_map(|v| lookup(v)).filter(|k| !k.is_empty()) else {
                continue;
            };
            let slot = self.llm.provider_mut(kind);
            let entry = slot.get_or_insert_with(ProviderConfig::default);
            if !entry.has_api_key() {
                entry.api_key = Some(key);
            }
        }

        if let Some(primary) = lookup("SLEUTH_PRIMARY_PROVIDER") {
            self.llm.primary = primary
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("unknown primary provider '{primary}'")))?;
        }

        if let Some(max) = lookup("SLEUTH_MAX_ITERATIONS") {
            self.research.max_iterations = max.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("SLEUTH_MAX_ITERATIONS must be a number, got '{max}'"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sleuth")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.research.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_iterations must be at least 1".into(),
            ));
        }

        if self.research.timeout_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "research.timeout_minutes must be at least 1".into(),
            ));
        }

        for kind in ProviderKind::ALL {
            let effort = self.llm.provider(kind).and_then(|p| p.reasoning_effort.as_deref());
            if let Some(effort) = effort {
                if !REASONING_EFFORTS.contains(&effort) {
                    return Err(ConfigError::ValidationError(format!(
                        "llm.{kind}.reasoning_effort must be one of {}",
                        REASONING_EFFORTS.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Expand `${VAR}` / `${VAR:default}` string values; `None` means "drop this key".
fn expand_placeholders(
    value: toml::Value,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<toml::Value> {
    match value {
        toml::Value::String(s) => {
            let Some(inner) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) else {
                return Some(toml::Value::String(s));
            };
            match inner.split_once(':') {
                Some((var, default)) => Some(toml::Value::String(
                    lookup(var).unwrap_or_else(|| default.to_string()),
                )),
                None => lookup(inner).map(toml::Value::String),
            }
        }
        toml::Value::Array(items) => Some(toml::Value::Array(
            items
                .into_iter()
                .filter_map(|item| expand_placeholders(item, lookup))
                .collect(),
        )),
        toml::Value::Table(table) => Some(toml::Value::Table(
            table
                .into_iter()
                .filter_map(|(k, v)| expand_placeholders(v, lookup).map(|v| (k, v)))
                .collect(),
        )),
        other => Some(other),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.primary, ProviderKind::OpenAi);
        assert_eq!(
            config.llm.fallback_order,
            vec![ProviderKind::Gemini, ProviderKind::OpenRouter]
        );
        assert_eq!(config.research.max_iterations, 6);
        assert_eq!(config.research.timeout_minutes, 15);
        assert_eq!(config.tools.web_search_timeout_seconds, 90);
        assert_eq!(config.tools.tool_execution_timeout_seconds, 60);
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed = AppConfig::from_toml_str(&toml_str, env(&[])).unwrap();
        assert_eq!(parsed.llm.primary, ProviderKind::OpenAi);
        assert_eq!(parsed.research.sparse_result_threshold, 2);
    }

    #[test]
    fn temperature_is_clamped() {
        let research = ResearchSettings {
            temperature: 1.7,
            ..ResearchSettings::default()
        };
        assert_eq!(research.effective_temperature(), 1.0);
        let research = ResearchSettings {
            temperature: -0.3,
            ..ResearchSettings::default()
        };
        assert_eq!(research.effective_temperature(), 0.0);
    }

    #[test]
    fn unknown_reasoning_effort_rejected() {
        let mut config = AppConfig::default();
        config.llm.openai = Some(ProviderConfig {
            reasoning_effort: Some("extreme".into()),
            ..ProviderConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.research.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_provider_in_file_rejected() {
        let result = AppConfig::from_toml_str("[llm]\nprimary = \"anthropic\"\n", env(&[]));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn placeholders_expand_from_environment() {
        let toml_str = r#"
[llm]
primary = "${PRIMARY:gemini}"

[llm.openai]
api_key = "${OPENAI_KEY}"
model = "gpt-4.1-mini"

[llm.gemini]
api_key = "${GEMINI_KEY}"
"#;
        let config = AppConfig::from_toml_str(toml_str, env(&[("OPENAI_KEY", "sk-test")])).unwrap();
        assert_eq!(config.llm.primary, ProviderKind::Gemini);
        assert_eq!(config.llm.openai.as_ref().unwrap().api_key.as_deref(), Some("sk-test"));
        assert!(config.llm.gemini.as_ref().unwrap().api_key.is_none());
        assert_eq!(config.llm.configured(), vec![ProviderKind::OpenAi]);
    }

    #[test]
    fn env_overrides_fill_provider_blocks() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("GEMINI_API_KEY", "g-key"),
                ("OPENROUTER_API_KEY", "or-key"),
                ("SLEUTH_PRIMARY_PROVIDER", "openrouter"),
                ("SLEUTH_MAX_ITERATIONS", "3"),
            ]))
            .unwrap();
        assert_eq!(config.llm.primary, ProviderKind::OpenRouter);
        assert_eq!(config.research.max_iterations, 3);
        assert_eq!(
            config.llm.configured(),
            vec![ProviderKind::Gemini, ProviderKind::OpenRouter]
        );
    }

    #[test]
    fn env_override_does_not_replace_file_key() {
        let mut config = AppConfig::default();
        config.llm.openai = Some(ProviderConfig {
            api_key: Some("from-file".into()),
            ..ProviderConfig::default()
        });
        config
            .apply_env_overrides(env(&[("OPENAI_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(config.llm.openai.unwrap().api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn bad_env_primary_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(env(&[("SLEUTH_PRIMARY_PROVIDER", "nope")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.research.max_iterations, 6);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[research]\nmax_iterations = 4\nfinish_guard_enabled = false\n\n[tools]\nweb_search_timeout_seconds = 30"
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.research.max_iterations, 4);
        assert!(!config.research.finish_guard_enabled);
        assert_eq!(config.tools.web_search_timeout_seconds, 30);
        assert_eq!(config.tools.tool_execution_timeout_seconds, 60);
    }

    #[test]
    fn debug_output_redacts_keys() {
        let provider = ProviderConfig {
            api_key: Some("sk-secret".into()),
            ..ProviderConfig::default()
        };
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
