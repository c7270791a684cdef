//! Configuration loading for AMAS.
//!
//! Reads the optional `config.toml`, merges its `[[providers]]` entries over
//! the built-in presets, and resolves each provider's API key from the
//! environment. A missing file is not an error; an unreadable or malformed
//! one is.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use secrecy::SecretString;

use amas_types::config::{ProviderEntry, RelayConfig, default_api_key_env};
use amas_types::error::ConfigError;
use amas_types::llm::{ProviderConfig, RequestFamily};

use crate::llm::presets::{self, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECONDS, ProviderPreset};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "AMAS_CONFIG";

/// Priority given to a custom provider that does not set one: after every preset.
const CUSTOM_PROVIDER_PRIORITY: i32 = 100;

/// Pick the config file to load.
///
/// Priority:
/// 1. An explicit path (the `--config` flag)
/// 2. `$AMAS_CONFIG`, when set and non-empty
/// 3. `~/.amas/config.toml`
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".amas").join("config.toml"))
}

/// Load a [`RelayConfig`] from `path`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If it cannot be read, returns [`ConfigError::Read`].
/// - If it does not parse, returns [`ConfigError::Parse`].
pub async fn load_relay_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(RelayConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let config = toml::from_str::<RelayConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    tracing::debug!(
        path = %path.display(),
        entries = config.providers.len(),
        "Loaded config file"
    );
    Ok(config)
}

/// Read an environment variable, treating unset and non-UTF-8 alike.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// A provider definition before its key is resolved.
#[derive(Debug, Clone)]
struct ProviderDraft {
    id: String,
    display_name: String,
    family: RequestFamily,
    base_url: String,
    model_id: String,
    api_key_env: String,
    priority: i32,
    max_tokens: u32,
    timeout_seconds: u64,
    enabled: bool,
    headers: BTreeMap<String, String>,
}

impl ProviderDraft {
    fn from_preset(preset: &ProviderPreset) -> Self {
        Self {
            id: preset.id.to_string(),
            display_name: preset.display_name.to_string(),
            family: preset.family,
            base_url: preset.base_url.to_string(),
            model_id: preset.model_id.to_string(),
            api_key_env: default_api_key_env(preset.id),
            priority: preset.priority,
            max_tokens: preset.max_tokens,
            timeout_seconds: preset.timeout_seconds,
            enabled: true,
            headers: preset
                .headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// A provider defined only by its config entry.
    fn from_entry(entry: &ProviderEntry) -> Result<Self, ConfigError> {
        let missing = |field: &str| ConfigError::InvalidProvider {
            provider: entry.id.clone(),
            reason: format!("missing `{field}` (required for providers without a preset)"),
        };

        Ok(Self {
            id: entry.id.clone(),
            display_name: entry.display_name.clone().unwrap_or_else(|| entry.id.clone()),
            family: entry.family.ok_or_else(|| missing("family"))?,
            base_url: entry.base_url.clone().ok_or_else(|| missing("base_url"))?,
            model_id: entry.model_id.clone().ok_or_else(|| missing("model_id"))?,
            api_key_env: entry
                .api_key_env
                .clone()
                .unwrap_or_else(|| default_api_key_env(&entry.id)),
            priority: entry.priority.unwrap_or(CUSTOM_PROVIDER_PRIORITY),
            max_tokens: entry.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout_seconds: entry.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            enabled: entry.enabled,
            headers: entry.headers.clone(),
        })
    }

    /// Apply every field the entry sets. Headers are merged, entry wins.
    fn apply(&mut self, entry: &ProviderEntry) {
        if let Some(display_name) = &entry.display_name {
            self.display_name = display_name.clone();
        }
        if let Some(family) = entry.family {
            self.family = family;
        }
        if let Some(base_url) = &entry.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(model_id) = &entry.model_id {
            self.model_id = model_id.clone();
        }
        if let Some(api_key_env) = &entry.api_key_env {
            self.api_key_env = api_key_env.clone();
        }
        if let Some(priority) = entry.priority {
            self.priority = priority;
        }
        if let Some(max_tokens) = entry.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(timeout_seconds) = entry.timeout_seconds {
            self.timeout_seconds = timeout_seconds;
        }
        self.enabled = entry.enabled;
        self.headers
            .extend(entry.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProvider {
            provider: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.base_url.trim().is_empty() {
            return Err(invalid("`base_url` is empty"));
        }
        if self.model_id.trim().is_empty() {
            return Err(invalid("`model_id` is empty"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("`max_tokens` must be positive"));
        }
        if self.timeout_seconds == 0 {
            return Err(invalid("`timeout_seconds` must be positive"));
        }
        Ok(())
    }

    fn resolve<F>(self, lookup: &F) -> ProviderConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&self.api_key_env)
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            tracing::debug!(
                provider = %self.id,
                env_var = %self.api_key_env,
                "No API key found; provider will be skipped"
            );
        }

        ProviderConfig {
            id: self.id,
            display_name: self.display_name,
            api_key,
            base_url: self.base_url,
            model_id: self.model_id,
            request_family: self.family,
            priority: self.priority,
            max_tokens: self.max_tokens,
            timeout_seconds: self.timeout_seconds,
            extra_headers: self.headers,
        }
    }
}

/// Merge presets and config entries into the final provider list.
///
/// `lookup` resolves environment variables; pass [`env_lookup`] in
/// production and a closure over a map in tests. The result keeps preset
/// order followed by custom providers; dispatch order is decided later by
/// priority.
///
/// # Errors
///
/// - [`ConfigError::DuplicateProvider`] when an id appears twice in the file.
/// - [`ConfigError::InvalidProvider`] for incomplete or out-of-range entries.
pub fn resolve_providers<F>(config: &RelayConfig, lookup: F) -> Result<Vec<ProviderConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut drafts: Vec<ProviderDraft> = if config.dispatch.use_presets {
        presets::PRESETS.iter().map(ProviderDraft::from_preset).collect()
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    for entry in &config.providers {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::InvalidProvider {
                provider: entry.id.clone(),
                reason: "`id` is empty".to_string(),
            });
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::DuplicateProvider(entry.id.clone()));
        }

        match drafts.iter_mut().find(|d| d.id == entry.id) {
            Some(draft) => draft.apply(entry),
            None => {
                // A preset id still works as a base when presets are off.
                let draft = match presets::find_preset(&entry.id) {
                    Some(preset) => {
                        let mut draft = ProviderDraft::from_preset(preset);
                        draft.apply(entry);
                        draft
                    }
                    None => ProviderDraft::from_entry(entry)?,
                };
                drafts.push(draft);
            }
        }
    }

    let mut providers = Vec::with_capacity(drafts.len());
    for draft in drafts.into_iter().filter(|d| d.enabled) {
        draft.validate()?;
        providers.push(draft.resolve(&lookup));
    }
    Ok(providers)
}
