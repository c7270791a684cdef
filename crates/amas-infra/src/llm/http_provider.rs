//! HttpProvider -- the reqwest-backed [`LlmProvider`] used for every family.
//!
//! The family normalizers decide the URL, headers and body; this type only
//! moves bytes. The API key stays inside the [`ProviderConfig`]'s
//! `SecretString` and is exposed only while building request headers.

use amas_core::llm::provider::LlmProvider;
use amas_types::llm::{Completion, GenerateRequest, LlmError, ProviderConfig};

use super::family;

/// One configured provider reachable over HTTP.
pub struct HttpProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpProvider {
    /// Build a provider with its own connection pool.
    ///
    /// The client timeout matches the provider's configured timeout so a
    /// stalled connection is torn down even outside the dispatcher.
    pub fn new(config: ProviderConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn map_send_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                timeout_ms: self.config.timeout().as_millis() as u64,
            }
        } else {
            LlmError::Transport(format!("HTTP request failed: {err}"))
        }
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.config.display_name
    }

    async fn complete(&self, request: &GenerateRequest) -> Result<Completion, LlmError> {
        let call = family::build_call(request, &self.config)?;

        let mut builder = self.client.post(&call.url).json(&call.body);
        for (name, value) in &call.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        tracing::debug!(
            provider = %self.config.id,
            status,
            bytes = body.len(),
            "Provider responded"
        );

        family::parse_response(
            self.config.request_family,
            status,
            &body,
            &self.config.display_name,
        )
    }
}
