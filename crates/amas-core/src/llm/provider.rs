//! LlmProvider trait definition.
//!
//! This is the port every provider backend implements. Uses RPITIT for
//! `complete`; see [`super::box_provider::BoxLlmProvider`] for the
//! object-safe wrapper the dispatcher stores.

use amas_types::llm::{Completion, GenerateRequest, LlmError};

/// Trait for LLM provider backends.
///
/// Implementations live in amas-infra (e.g., `HttpProvider`). A backend
/// performs exactly one attempt per call: no retries, no internal timeout
/// handling beyond what the transport imposes. The dispatcher owns both.
pub trait LlmProvider: Send + Sync {
    /// Human-readable name, reported as `provider_name` on success.
    fn name(&self) -> &str;

    /// Send a generic request and receive the normalized completion.
    fn complete(
        &self,
        request: &GenerateRequest,
    ) -> impl std::future::Future<Output = Result<Completion, LlmError>> + Send;
}
