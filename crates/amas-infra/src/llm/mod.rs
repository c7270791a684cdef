//! LLM provider implementations.
//!
//! Every provider is an [`HttpProvider`] parameterized by its
//! [`ProviderConfig`]; the per-family wire differences live in [`family`].
//!
//! Also provides a provider factory ([`create_provider`]) and the assembly
//! helpers that turn resolved configs into a ready [`FallbackDispatcher`].

pub mod family;
pub mod http_provider;
pub mod presets;

use amas_core::llm::box_provider::BoxLlmProvider;
use amas_core::llm::dispatcher::FallbackDispatcher;
use amas_core::llm::registry::ProviderRegistry;
use amas_types::config::RelayConfig;
use amas_types::error::ConfigError;
use amas_types::llm::{LlmError, ProviderConfig};

use crate::config::resolve_providers;

use self::http_provider::HttpProvider;

/// Create a [`BoxLlmProvider`] from a [`ProviderConfig`].
///
/// # Errors
///
/// [`LlmError::NotConfigured`] when the config carries no usable API key,
/// [`LlmError::Transport`] when the HTTP client cannot be built.
pub fn create_provider(config: &ProviderConfig) -> Result<BoxLlmProvider, LlmError> {
    if !config.has_api_key() {
        return Err(LlmError::NotConfigured(config.id.clone()));
    }
    let provider = HttpProvider::new(config.clone())?;
    Ok(BoxLlmProvider::new(provider))
}

/// Register every provider, building a backend for each keyed one.
///
/// Unkeyed providers are registered without a backend so they still show
/// up in listings and stats.
pub fn build_registry(providers: Vec<ProviderConfig>) -> Result<ProviderRegistry, ConfigError> {
    let mut registry = ProviderRegistry::new();
    for config in providers {
        let backend = if config.has_api_key() {
            let provider = create_provider(&config).map_err(|e| ConfigError::InvalidProvider {
                provider: config.id.clone(),
                reason: e.to_string(),
            })?;
            Some(provider)
        } else {
            None
        };
        registry.register(config, backend)?;
    }
    Ok(registry)
}

/// Resolve providers from `config` and the environment, then build the dispatcher.
///
/// # Errors
///
/// Any [`ConfigError`] from resolution, plus
/// [`ConfigError::NoUsableProviders`] when no provider ends up with a key.
pub fn build_dispatcher<F>(config: &RelayConfig, lookup: F) -> Result<FallbackDispatcher, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let providers = resolve_providers(config, lookup)?;
    let registry = build_registry(providers)?;
    tracing::debug!(order = ?registry.ordered_ids(), "Provider dispatch order");
    FallbackDispatcher::new(registry, config.dispatch.clone())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use amas_types::config::{DispatchSettings, ProviderEntry};
    use amas_types::llm::{GenerateRequest, Message, RequestFamily};

    use super::*;

    fn custom_entry(id: &str, priority: i32, server: &MockServer) -> ProviderEntry {
        let mut entry = ProviderEntry::named(id);
        entry.family = Some(RequestFamily::OpenAiChat);
        entry.base_url = Some(format!("{}/{id}", server.uri()));
        entry.model_id = Some(format!("{id}-model"));
        entry.priority = Some(priority);
        entry.timeout_seconds = Some(5);
        entry
    }

    fn relay_config(entries: Vec<ProviderEntry>) -> RelayConfig {
        RelayConfig {
            dispatch: DispatchSettings {
                use_presets: false,
                ..DispatchSettings::default()
            },
            providers: entries,
        }
    }

    fn keys(ids: &[&str]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = ids
            .iter()
            .map(|id| (amas_types::config::default_api_key_env(id), format!("{id}-key")))
            .collect();
        move |name| vars.get(name).cloned()
    }

    async fn mount_status(server: &MockServer, id: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/{id}/chat/completions")))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(server)
            .await;
    }

    async fn mount_reply(server: &MockServer, id: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{id}/chat/completions")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(server)
            .await;
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![Message::user("hello")])
    }

    #[test]
    fn test_create_provider_requires_key() {
        let config = ProviderConfig {
            id: "groq".to_string(),
            display_name: "Groq".to_string(),
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model_id: "m".to_string(),
            request_family: RequestFamily::OpenAiChat,
            priority: 1,
            max_tokens: 1024,
            timeout_seconds: 30,
            extra_headers: BTreeMap::new(),
        };
        assert!(matches!(create_provider(&config), Err(LlmError::NotConfigured(_))));

        let keyed = ProviderConfig {
            api_key: Some(SecretString::from("gsk")),
            ..config
        };
        assert_eq!(create_provider(&keyed).unwrap().name(), "Groq");
    }

    #[test]
    fn test_build_dispatcher_fails_without_keys() {
        let err = build_dispatcher(&RelayConfig::default(), |_| None).err();
        assert!(matches!(err, Some(ConfigError::NoUsableProviders { total: 16 })));
    }

    #[tokio::test]
    async fn test_first_provider_error_falls_over_to_second() {
        let server = MockServer::start().await;
        mount_status(&server, "alpha", 500).await;
        mount_reply(&server, "beta", "ok").await;

        let config = relay_config(vec![
            custom_entry("alpha", 1, &server),
            custom_entry("beta", 2, &server),
        ]);
        let dispatcher = build_dispatcher(&config, keys(&["alpha", "beta"])).unwrap();

        let result = dispatcher.generate(&request()).await;
        assert!(result.success);
        assert_eq!(result.content, "ok");
        assert_eq!(result.provider_name.as_deref(), Some("beta"));

        let stats = dispatcher.get_stats();
        assert_eq!(stats.per_provider["alpha"].failure_count, 1);
        assert_eq!(stats.per_provider["beta"].success_count, 1);
    }

    #[tokio::test]
    async fn test_every_provider_failing_reports_all_failed() {
        let server = MockServer::start().await;
        for id in ["alpha", "beta", "gamma"] {
            mount_status(&server, id, 500).await;
        }

        let config = relay_config(vec![
            custom_entry("alpha", 1, &server),
            custom_entry("beta", 2, &server),
            custom_entry("gamma", 3, &server),
        ]);
        let dispatcher = build_dispatcher(&config, keys(&["alpha", "beta", "gamma"])).unwrap();

        let result = dispatcher.generate(&request()).await;
        assert!(!result.success);
        assert!(!result.error.unwrap_or_default().is_empty());

        let stats = dispatcher.get_stats();
        for id in ["alpha", "beta", "gamma"] {
            assert_eq!(stats.per_provider[id].failure_count, 1, "{id}");
        }
    }

    #[tokio::test]
    async fn test_unkeyed_provider_sends_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alpha/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        mount_reply(&server, "beta", "ok").await;

        let config = relay_config(vec![
            custom_entry("alpha", 1, &server),
            custom_entry("beta", 2, &server),
        ]);
        let dispatcher = build_dispatcher(&config, keys(&["beta"])).unwrap();

        let result = dispatcher.generate(&request()).await;
        assert_eq!(result.content, "ok");

        let stats = dispatcher.get_stats();
        let alpha = &stats.per_provider["alpha"];
        assert_eq!((alpha.total_calls, alpha.success_count, alpha.failure_count), (0, 0, 0));
        assert!(!alpha.configured);
    }
}
