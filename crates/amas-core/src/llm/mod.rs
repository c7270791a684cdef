//! Provider abstractions and the fallback dispatcher.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: the fixed, priority-ordered provider list
//! - `ProviderHealth`: per-provider counters and the health gate
//! - `FallbackDispatcher`: the generate / stats / reset surface

pub mod box_provider;
pub mod dispatcher;
pub mod health;
pub mod provider;
pub mod registry;
