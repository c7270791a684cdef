//! Gemini `generateContent` shape.
//!
//! Gemini only knows `user` and `model` turns, so assistant messages map to
//! `model` and system messages are flattened into `user` turns.

use serde::Serialize;

use amas_types::llm::{GenerateRequest, LlmError, MessageRole, ProviderConfig};

use super::HttpCall;

pub(super) const CONTENT_POINTER: &str = "/candidates/0/content/parts/0/text";
pub(super) const USAGE_POINTER: &str = "/usageMetadata";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

fn gemini_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::System => "user",
    }
}

pub(super) fn build(
    request: &GenerateRequest,
    config: &ProviderConfig,
    base_url: &str,
    api_key: &str,
    max_tokens: u32,
) -> Result<HttpCall, LlmError> {
    let body = GenerateContentRequest {
        contents: request
            .messages
            .iter()
            .map(|m| Content {
                role: gemini_role(m.role),
                parts: vec![Part { text: &m.content }],
            })
            .collect(),
        generation_config: GenerationConfig {
            max_output_tokens: max_tokens,
            temperature: request.temperature,
        },
    };

    Ok(HttpCall {
        url: format!("{base_url}/models/{}:generateContent", config.model_id),
        headers: vec![("x-goog-api-key".to_string(), api_key.to_string())],
        body: super::encode_body(&body)?,
    })
}
