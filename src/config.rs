//! Runtime configuration resolved from the process environment.

use std::env;

/// Environment variable holding the API credential. Required.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable overriding the API base URL.
pub const API_BASE_VAR: &str = "OPENAI_API_BASE";
/// Environment variable overriding the model.
pub const MODEL_VAR: &str = "PARLEY_MODEL";

/// Default API base URL when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The required API credential is missing from the environment
    #[error("missing required environment variable {var}")]
    MissingApiKey { var: &'static str },
}

/// Resolved runtime configuration for the chat front-end.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the completion API
    pub api_key: String,
    /// Base URL of the completion API
    pub api_base: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Whether answers are streamed incrementally (default) or fetched whole
    pub stream_responses: bool,
}

impl Config {
    /// Create a config with defaults for everything but the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            stream_responses: true,
        }
    }

    /// Resolve configuration from the process environment.
    ///
    /// A missing API key is a fatal startup error; base URL and model fall
    /// back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingApiKey { var: API_KEY_VAR })?;

        let mut config = Self::new(api_key);
        if let Ok(base) = env::var(API_BASE_VAR) {
            if !base.is_empty() {
                config.api_base = base;
            }
        }
        if let Ok(model) = env::var(MODEL_VAR) {
            if !model.is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    /// Override the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enable or disable streamed answers.
    pub fn with_stream_responses(mut self, stream: bool) -> Self {
        self.stream_responses = stream;
        self
    }
}
