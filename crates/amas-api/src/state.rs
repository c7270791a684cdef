//! Application state shared by the CLI commands.
//!
//! Holds the loaded configuration and builds the dispatcher on demand, so
//! commands that only inspect configuration (`amas providers`) work even
//! when no API key is set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use amas_core::llm::dispatcher::FallbackDispatcher;
use amas_infra::config::{env_lookup, load_relay_config, resolve_config_path, resolve_providers};
use amas_infra::llm::build_dispatcher;
use amas_types::config::RelayConfig;
use amas_types::llm::ProviderConfig;

pub struct AppState {
    /// The file the config was looked up at, if any location applied.
    pub config_path: Option<PathBuf>,
    pub config: RelayConfig,
}

impl AppState {
    /// Locate and load the config file.
    pub async fn init(explicit_config: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(explicit_config);
        let config = match &config_path {
            Some(path) => load_relay_config(path)
                .await
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Every enabled provider with its key resolved from the environment.
    pub fn providers(&self) -> anyhow::Result<Vec<ProviderConfig>> {
        resolve_providers(&self.config, env_lookup).context("invalid provider configuration")
    }

    /// Build a dispatcher over the configured providers.
    pub fn dispatcher(&self) -> anyhow::Result<Arc<FallbackDispatcher>> {
        let dispatcher = build_dispatcher(&self.config, env_lookup)
            .context("could not build the provider dispatcher")?;
        Ok(Arc::new(dispatcher))
    }
}
