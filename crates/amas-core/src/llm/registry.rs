//! Provider registry.
//!
//! Holds the fixed provider list and produces the dispatch order. Providers
//! without an API key stay registered (they show up in listings and stats)
//! but the dispatcher never selects them.

use amas_types::error::ConfigError;
use amas_types::llm::ProviderConfig;

use super::box_provider::BoxLlmProvider;

/// A provider configuration paired with its backend, if one was built.
#[derive(Debug)]
pub struct RegisteredProvider {
    pub config: ProviderConfig,
    /// `None` when no backend could be built (typically: no API key).
    pub backend: Option<BoxLlmProvider>,
}

impl RegisteredProvider {
    /// Keyed and backed: eligible for selection as far as configuration goes.
    pub fn is_usable(&self) -> bool {
        self.config.has_api_key() && self.backend.is_some()
    }
}

/// Fixed set of providers in insertion order.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Ids must be unique.
    pub fn register(
        &mut self,
        config: ProviderConfig,
        backend: Option<BoxLlmProvider>,
    ) -> Result<(), ConfigError> {
        if self.entries.iter().any(|e| e.config.id == config.id) {
            return Err(ConfigError::DuplicateProvider(config.id));
        }
        self.entries.push(RegisteredProvider { config, backend });
        Ok(())
    }

    /// Provider configs sorted ascending by priority; ties keep insertion order.
    pub fn list_providers(&self) -> Vec<&ProviderConfig> {
        let mut configs: Vec<&ProviderConfig> = self.entries.iter().map(|e| &e.config).collect();
        // `sort_by_key` is stable.
        configs.sort_by_key(|c| c.priority);
        configs
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredProvider> {
        self.entries.iter().find(|e| e.config.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of providers that can actually be selected.
    pub fn usable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_usable()).count()
    }

    /// Consume the registry, yielding entries in dispatch order.
    pub fn into_ordered(self) -> Vec<RegisteredProvider> {
        let mut entries = self.entries;
        entries.sort_by_key(|e| e.config.priority);
        entries
    }

    /// Ids in dispatch order.
    pub fn ordered_ids(&self) -> Vec<&str> {
        self.list_providers()
            .into_iter()
            .map(|c| c.id.as_str())
            .collect()
    }
}
