//! Cohere v2 chat shape.
//!
//! The request mirrors OpenAI's message list; the reply nests its text in a
//! content-block array under `message`.

use serde::Serialize;

use amas_types::llm::{GenerateRequest, LlmError, ProviderConfig};

use super::HttpCall;

pub(super) const CONTENT_POINTER: &str = "/message/content/0/text";
pub(super) const USAGE_POINTER: &str = "/usage";

#[derive(Serialize)]
struct CohereChatRequest<'a> {
    model: &'a str,
    messages: Vec<CohereMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct CohereMessage<'a> {
    role: String,
    content: &'a str,
}

pub(super) fn build(
    request: &GenerateRequest,
    config: &ProviderConfig,
    base_url: &str,
    api_key: &str,
    max_tokens: u32,
) -> Result<HttpCall, LlmError> {
    let body = CohereChatRequest {
        model: &config.model_id,
        messages: request
            .messages
            .iter()
            .map(|m| CohereMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
        max_tokens,
        temperature: request.temperature,
    };

    Ok(HttpCall {
        url: format!("{base_url}/chat"),
        headers: vec![("authorization".to_string(), format!("Bearer {api_key}"))],
        body: super::encode_body(&body)?,
    })
}
