//! Request/response normalization per wire-format family.
//!
//! Every family module turns a generic [`GenerateRequest`] into an
//! [`HttpCall`] and pulls the completion text back out of the response
//! body. Nothing in here touches the network, so each family is tested
//! against literal JSON.

mod cohere;
mod gemini;
mod openai;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;

use amas_types::llm::{Completion, GenerateRequest, LlmError, ProviderConfig, RequestFamily};

/// Error bodies longer than this are cut before they reach logs and results.
const MAX_ERROR_BODY_CHARS: usize = 1_000;

/// A fully prepared POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub url: String,
    /// Auth header first, then the provider's extra headers. reqwest adds
    /// the JSON content type when it encodes `body`.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Build the HTTP call for `request` against `config`.
///
/// `max_tokens` is the request's value clamped to the provider's limit,
/// or the provider's limit when the request leaves it unset.
///
/// # Errors
///
/// - [`LlmError::NotConfigured`] when the provider has no API key.
/// - [`LlmError::InvalidRequest`] when the body cannot be encoded as JSON.
pub fn build_call(request: &GenerateRequest, config: &ProviderConfig) -> Result<HttpCall, LlmError> {
    let api_key = config
        .api_key
        .as_ref()
        .map(|key| key.expose_secret().trim())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| LlmError::NotConfigured(config.id.clone()))?;

    let base_url = config.base_url.trim_end_matches('/');
    let max_tokens = request.effective_max_tokens(config.max_tokens);

    let mut call = match config.request_family {
        RequestFamily::OpenAiChat => openai::build(request, config, base_url, api_key, max_tokens)?,
        RequestFamily::GeminiGenerateContent => {
            gemini::build(request, config, base_url, api_key, max_tokens)?
        }
        RequestFamily::CohereChat => {
            cohere::build(request, config, base_url, api_key, max_tokens)?
        }
    };

    call.headers.extend(
        config
            .extra_headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    Ok(call)
}

fn encode_body<T: Serialize>(body: &T) -> Result<Value, LlmError> {
    serde_json::to_value(body)
        .map_err(|e| LlmError::InvalidRequest(format!("failed to encode request body: {e}")))
}

/// Turn a raw HTTP response into a [`Completion`].
///
/// # Errors
///
/// - [`LlmError::Provider`] for any non-2xx status, carrying the body.
/// - [`LlmError::Deserialization`] for a 2xx body that is not JSON or
///   lacks the family's content field.
pub fn parse_response(
    family: RequestFamily,
    status: u16,
    body: &str,
    provider_name: &str,
) -> Result<Completion, LlmError> {
    if !(200..300).contains(&status) {
        return Err(LlmError::Provider {
            status_code: status,
            body: truncate_body(body),
        });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::Deserialization(format!("response is not valid JSON: {e}")))?;

    let (content_pointer, usage_pointer) = match family {
        RequestFamily::OpenAiChat => (openai::CONTENT_POINTER, openai::USAGE_POINTER),
        RequestFamily::GeminiGenerateContent => (gemini::CONTENT_POINTER, gemini::USAGE_POINTER),
        RequestFamily::CohereChat => (cohere::CONTENT_POINTER, cohere::USAGE_POINTER),
    };

    let content = value
        .pointer(content_pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LlmError::Deserialization(format!(
                "{family} response has no text at {content_pointer}"
            ))
        })?;

    Ok(Completion {
        content: content.to_string(),
        provider_name: provider_name.to_string(),
        raw_usage: value.pointer(usage_pointer).cloned(),
    })
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use secrecy::SecretString;
    use serde_json::json;

    use amas_types::llm::Message;

    use super::*;

    fn config(family: RequestFamily) -> ProviderConfig {
        ProviderConfig {
            id: "test".to_string(),
            display_name: "Test".to_string(),
            api_key: Some(SecretString::from("sk-test")),
            base_url: "https://api.example.com/v1/".to_string(),
            model_id: "model-x".to_string(),
            request_family: family,
            priority: 1,
            max_tokens: 2048,
            timeout_seconds: 30,
            extra_headers: BTreeMap::from([("X-Title".to_string(), "amas".to_string())]),
        }
    }

    #[test]
    fn test_build_call_requires_key() {
        let mut config = config(RequestFamily::OpenAiChat);
        config.api_key = Some(SecretString::from("   "));
        let err = build_call(&GenerateRequest::new(vec![]), &config).unwrap_err();
        assert_eq!(err, LlmError::NotConfigured("test".to_string()));
    }

    #[test]
    fn test_build_call_appends_extra_headers_last() {
        let call = build_call(
            &GenerateRequest::new(vec![Message::user("hi")]),
            &config(RequestFamily::OpenAiChat),
        )
        .unwrap();
        assert_eq!(
            call.headers,
            vec![
                ("authorization".to_string(), "Bearer sk-test".to_string()),
                ("X-Title".to_string(), "amas".to_string()),
            ]
        );
    }

    #[test]
    fn test_unencodable_body_is_invalid_request() {
        struct Unencodable;

        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not representable"))
            }
        }

        match encode_body(&Unencodable).unwrap_err() {
            LlmError::InvalidRequest(msg) => assert!(msg.contains("not representable")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_success_status_is_provider_error() {
        let err = parse_response(RequestFamily::OpenAiChat, 503, "overloaded", "Test").unwrap_err();
        assert_eq!(
            err,
            LlmError::Provider {
                status_code: 503,
                body: "overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_json_is_deserialization_error() {
        let err = parse_response(RequestFamily::OpenAiChat, 200, "<html>", "Test").unwrap_err();
        assert!(matches!(err, LlmError::Deserialization(_)));
    }

    #[test]
    fn test_missing_content_is_deserialization_error() {
        let body = json!({ "choices": [] }).to_string();
        let err = parse_response(RequestFamily::OpenAiChat, 200, &body, "Test").unwrap_err();
        match err {
            LlmError::Deserialization(msg) => assert!(msg.contains("/choices/0/message/content")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 50);
        let err = parse_response(RequestFamily::CohereChat, 500, &body, "Test").unwrap_err();
        match err {
            LlmError::Provider { body, .. } => {
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
