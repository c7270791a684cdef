//! LLM request/response types for the fallback dispatcher.
//!
//! These types model the provider-independent shapes that flow through a
//! dispatch: the generic chat request, the normalized completion a provider
//! returns, the per-call result handed back to callers, and the per-attempt
//! error taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Generic chat request, independent of any provider wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    /// Upper bound on generated tokens. `None` uses each provider's configured limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl GenerateRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Token limit to send to a provider whose own ceiling is `provider_max`.
    pub fn effective_max_tokens(&self, provider_max: u32) -> u32 {
        match self.max_tokens {
            Some(requested) => requested.min(provider_max),
            None => provider_max,
        }
    }
}

/// Normalized successful response from a single provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub provider_name: String,
    /// Usage block exactly as the provider reported it, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_usage: Option<serde_json::Value>,
}

/// One provider attempt made while serving a `generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider_id: String,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one `generate` call.
///
/// Exhausting every provider is reported as `success == false` with the
/// last error message, never as an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_usage: Option<serde_json::Value>,
    pub attempts: Vec<AttemptRecord>,
    pub latency_ms: u64,
}

/// Content placed in a failed [`GenerateResult`].
pub const ALL_PROVIDERS_FAILED: &str = "All providers failed";

impl GenerateResult {
    pub fn succeeded(
        provider_id: &str,
        completion: Completion,
        attempts: Vec<AttemptRecord>,
        latency_ms: u64,
    ) -> Self {
        Self {
            success: true,
            content: completion.content,
            provider_name: Some(completion.provider_name),
            provider_id: Some(provider_id.to_string()),
            error: None,
            raw_usage: completion.raw_usage,
            attempts,
            latency_ms,
        }
    }

    pub fn all_failed(error: String, attempts: Vec<AttemptRecord>, latency_ms: u64) -> Self {
        Self {
            success: false,
            content: ALL_PROVIDERS_FAILED.to_string(),
            provider_name: None,
            provider_id: None,
            error: Some(error),
            raw_usage: None,
            attempts,
            latency_ms,
        }
    }
}

/// Wire-format family a provider speaks.
///
/// Determines how a generic request is serialized and how the response
/// body is parsed back into a [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFamily {
    /// `POST {base}/chat/completions`, content at `choices[0].message.content`.
    OpenAiChat,
    /// `POST {base}/models/{model}:generateContent`, content at
    /// `candidates[0].content.parts[0].text`.
    GeminiGenerateContent,
    /// `POST {base}/chat`, content at `message.content[0].text`.
    CohereChat,
}

impl fmt::Display for RequestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFamily::OpenAiChat => write!(f, "openai_chat"),
            RequestFamily::GeminiGenerateContent => write!(f, "gemini_generate_content"),
            RequestFamily::CohereChat => write!(f, "cohere_chat"),
        }
    }
}

impl FromStr for RequestFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_chat" | "openai" => Ok(RequestFamily::OpenAiChat),
            "gemini_generate_content" | "gemini" => Ok(RequestFamily::GeminiGenerateContent),
            "cohere_chat" | "cohere" => Ok(RequestFamily::CohereChat),
            other => Err(format!("invalid request family: '{other}'")),
        }
    }
}

/// Immutable configuration for one provider, fixed at dispatcher construction.
///
/// The API key is a [`SecretString`], so `Debug` output never shows it.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique key (e.g., "groq").
    pub id: String,
    /// Human label reported as `provider_name` in results.
    pub display_name: String,
    /// `None` keeps the provider in the registry but it is never selected.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model_id: String,
    pub request_family: RequestFamily,
    /// Lower = tried first.
    pub priority: i32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// Extra headers sent with every request to this provider.
    pub extra_headers: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Whether a non-empty API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Errors from a single provider attempt.
///
/// Every variant is caught by the dispatcher, recorded against the
/// provider's health and turned into a failover.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("provider returned HTTP {status_code}: {body}")]
    Provider { status_code: u16, body: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// HTTP status code, when the failure came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::Provider { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}
