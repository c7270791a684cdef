//! Shared data types for the AMAS provider fallback dispatcher.
//!
//! Messages, generate requests and results, provider configuration,
//! statistics snapshots and the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod config;
pub mod error;
pub mod llm;
pub mod stats;
