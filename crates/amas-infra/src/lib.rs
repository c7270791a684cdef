//! Infrastructure for AMAS: HTTP provider backends, the built-in provider
//! presets, and configuration loading.

pub mod config;
pub mod llm;
