use thiserror::Error;

/// Errors raised while loading configuration or assembling the dispatcher.
///
/// These are the only errors the dispatcher surfaces as `Err`; per-attempt
/// provider failures are reported inside `GenerateResult` instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no usable providers: none of the {total} configured providers has an API key")]
    NoUsableProviders { total: usize },

    #[error("provider '{0}' is defined more than once")]
    DuplicateProvider(String),

    #[error("invalid provider '{provider}': {reason}")]
    InvalidProvider { provider: String, reason: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}
