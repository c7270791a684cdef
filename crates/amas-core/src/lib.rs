//! Dispatch logic for the AMAS provider fallback manager.
//!
//! This crate defines the provider port (`LlmProvider`), the registry that
//! orders providers, per-provider health tracking and the fallback
//! dispatcher itself. It depends only on `amas-types` -- never on
//! `amas-infra` or any HTTP crate.

pub mod llm;
