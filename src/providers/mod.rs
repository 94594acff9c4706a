//! Chat-completion clients for the supported model providers

pub mod claude;
pub mod openai;
pub mod retry;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, with_retry};

use async_trait::async_trait;
use std::time::Duration;

use crate::models::TokenUsage;

/// A single chat completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            user_message: user_message.into(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub latency: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited | ProviderError::Timeout { .. } => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::OpenAi(async_openai::error::OpenAIError::Reqwest(e)) => {
                e.is_timeout() || e.is_connect()
            }
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Transport to one provider's chat completion API
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse>;
}

fn api_key_from_env(env_var: &str) -> ProviderResult<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ProviderError::Config(format!(
            "Environment variable {} not found",
            env_var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Timeout { timeout_ms: 10 }.is_transient());
        assert!(
            ProviderError::Api {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_transient()
        );
        assert!(!ProviderError::Parse("bad json".to_string()).is_transient());
        assert!(!ProviderError::Config("missing key".to_string()).is_transient());
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("gpt-4o-2024-08-06", "hello")
            .with_system("be brief")
            .with_max_tokens(64)
            .with_temperature(0.1);
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.temperature, 0.1);
    }

    #[test]
    fn test_api_key_from_env_missing() {
        let err = api_key_from_env("PROMPT_TOURNAMENT_TEST_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
