//! OpenAI chat-completions shape.
//!
//! Most presets speak this: the message list is passed through as-is and
//! auth is a bearer token.

use serde::Serialize;

use amas_types::llm::{GenerateRequest, LlmError, ProviderConfig};

use super::HttpCall;

pub(super) const CONTENT_POINTER: &str = "/choices/0/message/content";
pub(super) const USAGE_POINTER: &str = "/usage";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
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
    let body = ChatRequest {
        model: &config.model_id,
        messages: request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.to_string(),
                content: &m.content,
            })
            .collect(),
        max_tokens,
        temperature: request.temperature,
    };

    Ok(HttpCall {
        url: format!("{base_url}/chat/completions"),
        headers: vec![("authorization".to_string(), format!("Bearer {api_key}"))],
        body: super::encode_body(&body)?,
    })
}
