//! The generate/judge capabilities the orchestrator consumes, the
//! chat-backed implementation, and the registry that resolves model
//! selectors against them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::catalog::{ModelInfo, ModelRole, ModelSelector, ProviderKind};
use crate::config::{SamplingConfig, Settings};
use crate::error::{EvalError, EvalResult};
use crate::judge::{self, JudgeRequest};
use crate::models::TokenUsage;
use crate::providers::{
    ChatProvider, ClaudeClient, CompletionRequest, CompletionResponse, OpenAiClient,
    ProviderError, ProviderResult, RetryPolicy, with_retry,
};

/// Output of a successful generate call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub output: String,
    pub latency: Duration,
    pub usage: TokenUsage,
}

/// Output of a successful judge call, scores already normalized to `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub scores: HashMap<String, f64>,
    pub reasoning: HashMap<String, String>,
    pub latency: Duration,
    pub usage: TokenUsage,
}

/// What the orchestrator needs from a model provider
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Run `prompt` against `test_input`. Errors and empty output are
    /// [`EvalError::Generation`].
    async fn generate(&self, model: &str, prompt: &str, test_input: &str)
    -> EvalResult<Generation>;

    /// Score one output against every criterion. Errors and unusable
    /// verdicts are [`EvalError::Judge`].
    async fn judge(&self, model: &str, request: &JudgeRequest<'_>) -> EvalResult<Judgement>;
}

/// [`ModelCapability`] on top of a chat-completion provider
pub struct ChatCapability {
    provider: Arc<dyn ChatProvider>,
    generation: SamplingConfig,
    judge: SamplingConfig,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ChatCapability {
    pub fn new(provider: Arc<dyn ChatProvider>, settings: &Settings) -> Self {
        Self {
            provider,
            generation: settings.generation,
            judge: settings.judge,
            timeout: settings.limits.request_timeout(),
            retry: settings.limits.retry_policy(),
        }
    }

    /// One logical call: every attempt gets its own timeout, transient
    /// failures are retried
    async fn complete(
        &self,
        request: CompletionRequest,
        operation: &str,
    ) -> ProviderResult<CompletionResponse> {
        let request = &request;
        let timeout = self.timeout;

        with_retry(self.retry, operation, || async move {
            match tokio::time::timeout(timeout, self.provider.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        })
        .await
    }
}

#[async_trait]
impl ModelCapability for ChatCapability {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        test_input: &str,
    ) -> EvalResult<Generation> {
        let request = CompletionRequest::new(model, test_input)
            .with_system(prompt)
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature);

        let response = self
            .complete(request, "generation")
            .await
            .map_err(|e| EvalError::Generation(format!("{} {}", self.provider.name(), e)))?;

        if response.content.trim().is_empty() {
            return Err(EvalError::Generation(format!(
                "{} returned empty output",
                self.provider.name()
            )));
        }

        Ok(Generation {
            output: response.content,
            latency: response.latency,
            usage: response.usage,
        })
    }

    async fn judge(&self, model: &str, request: &JudgeRequest<'_>) -> EvalResult<Judgement> {
        let completion = CompletionRequest::new(model, judge::build_judge_prompt(request))
            .with_system(judge::JUDGE_SYSTEM_PROMPT)
            .with_max_tokens(self.judge.max_tokens)
            .with_temperature(self.judge.temperature);

        let response = self
            .complete(completion, "judge")
            .await
            .map_err(|e| EvalError::Judge(format!("{} {}", self.provider.name(), e)))?;

        let parsed = judge::parse_judgement(&response.content, request.criteria)?;
        Ok(Judgement {
            scores: parsed.scores,
            reasoning: parsed.reasoning,
            latency: response.latency,
            usage: response.usage,
        })
    }
}

/// A selector checked against the catalog and bound to an implementation
#[derive(Clone)]
pub struct ResolvedModel {
    pub selector: ModelSelector,
    pub info: &'static ModelInfo,
    pub capability: Arc<dyn ModelCapability>,
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("selector", &self.selector)
            .field("info", &self.info.id)
            .finish_non_exhaustive()
    }
}

/// Capability implementation per provider, fixed once built
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<ProviderKind, Arc<dyn ModelCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat-backed capability for every provider whose API key is set
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new();

        for kind in ProviderKind::ALL {
            let provider_config = settings.provider(kind);
            let client: ProviderResult<Arc<dyn ChatProvider>> = match kind {
                ProviderKind::OpenAi => {
                    OpenAiClient::from_env(&provider_config.api_key_env, &provider_config.base_url)
                        .map(|client| Arc::new(client) as Arc<dyn ChatProvider>)
                }
                ProviderKind::Claude => {
                    ClaudeClient::from_env(&provider_config.api_key_env, &provider_config.base_url)
                        .map(|client| Arc::new(client) as Arc<dyn ChatProvider>)
                }
            };

            match client {
                Ok(client) => {
                    debug!("Registered provider {}", kind);
                    registry.register(kind, Arc::new(ChatCapability::new(client, settings)));
                }
                Err(e) => debug!("Provider {} not registered: {}", kind, e),
            }
        }

        registry
    }

    pub fn register(&mut self, kind: ProviderKind, capability: Arc<dyn ModelCapability>) {
        self.capabilities.insert(kind, capability);
    }

    pub fn with(mut self, kind: ProviderKind, capability: Arc<dyn ModelCapability>) -> Self {
        self.register(kind, capability);
        self
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.capabilities.contains_key(&kind)
    }

    /// Check `selector` against the catalog for `role` and bind it to its provider
    pub fn resolve(&self, selector: &ModelSelector, role: ModelRole) -> EvalResult<ResolvedModel> {
        let info = selector.catalog_entry(role)?;
        let capability = self.capabilities.get(&selector.provider).ok_or_else(|| {
            EvalError::Configuration(format!(
                "Provider {} is not configured (no API key found)",
                selector.provider
            ))
        })?;

        Ok(ResolvedModel {
            selector: selector.clone(),
            info,
            capability: Arc::clone(capability),
        })
    }
}
