//! Configuration file schema.
//!
//! `RelayConfig` is the top-level `config.toml`. Every field has a default,
//! so an empty file (or no file at all) yields the built-in provider presets
//! with sequential dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::RequestFamily;

/// Top-level configuration for the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Overrides for built-in presets, or additional providers.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// How a fallback scan walks the provider list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One provider at a time, in priority order.
    #[default]
    Sequential,
    /// Up to `race_width` providers at once; first success wins.
    Race,
}

/// Dispatcher-wide settings (the `[dispatch]` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// A provider turns unhealthy once failures since the last reset exceed this.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    #[serde(default)]
    pub mode: DispatchMode,

    /// Providers attempted concurrently in race mode.
    #[serde(default = "default_race_width")]
    pub race_width: usize,

    /// Start from the built-in provider presets.
    #[serde(default = "default_use_presets")]
    pub use_presets: bool,
}

fn default_failure_threshold() -> u64 {
    5
}

fn default_race_width() -> usize {
    2
}

fn default_use_presets() -> bool {
    true
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            mode: DispatchMode::default(),
            race_width: default_race_width(),
            use_presets: default_use_presets(),
        }
    }
}

/// One `[[providers]]` entry.
///
/// When `id` matches a built-in preset, every field set here overrides the
/// preset's value. Otherwise `family`, `base_url` and `model_id` are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub family: Option<RequestFamily>,
    pub base_url: Option<String>,
    pub model_id: Option<String>,
    /// Environment variable holding the API key. Defaults to `<ID>_API_KEY`.
    pub api_key_env: Option<String>,
    pub priority: Option<i32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderEntry {
    /// An entry that only names a provider, overriding nothing.
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            family: None,
            base_url: None,
            model_id: None,
            api_key_env: None,
            priority: None,
            max_tokens: None,
            timeout_seconds: None,
            enabled: default_enabled(),
            headers: BTreeMap::new(),
        }
    }
}

/// Conventional environment variable name for a provider's API key.
pub fn default_api_key_env(provider_id: &str) -> String {
    let normalized: String = provider_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{normalized}_API_KEY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_empty_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.dispatch.failure_threshold, 5);
        assert_eq!(config.dispatch.mode, DispatchMode::Sequential);
        assert_eq!(config.dispatch.race_width, 2);
        assert!(config.dispatch.use_presets);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_relay_config_with_providers() {
        let toml_str = r#"
[dispatch]
failure_threshold = 3
mode = "race"
race_width = 3

[[providers]]
id = "groq"
priority = 0

[[providers]]
id = "local-vllm"
display_name = "Local vLLM"
family = "openai_chat"
base_url = "http://localhost:8000/v1"
model_id = "qwen2.5-7b"
api_key_env = "VLLM_TOKEN"

[providers.headers]
X-Team = "research"

[[providers]]
id = "cohere"
enabled = false
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dispatch.failure_threshold, 3);
        assert_eq!(config.dispatch.mode, DispatchMode::Race);
        assert_eq!(config.dispatch.race_width, 3);
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.providers[0].priority, Some(0));
        assert!(config.providers[0].enabled);
        assert_eq!(
            config.providers[1].family,
            Some(RequestFamily::OpenAiChat)
        );
        assert_eq!(
            config.providers[1].headers.get("X-Team").map(String::as_str),
            Some("research")
        );
        assert!(!config.providers[2].enabled);
    }

    #[test]
    fn test_default_api_key_env() {
        assert_eq!(default_api_key_env("groq"), "GROQ_API_KEY");
        assert_eq!(default_api_key_env("local-vllm"), "LOCAL_VLLM_API_KEY");
    }
}
