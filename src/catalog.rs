//! Supported providers and the models they expose.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EvalError;
use crate::models::TokenUsage;

/// Model providers this crate can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Claude];

    /// Canonical name reported in responses
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
        }
    }

    /// Human-readable name for listings
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Claude => "Anthropic Claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = EvalError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            other => Err(EvalError::Configuration(format!(
                "Unknown provider: {}. Available providers: openai, claude",
                other
            ))),
        }
    }
}

/// What a resolved model is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Generation,
    Evaluation,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Generation => f.write_str("generation"),
            ModelRole::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// Catalog entry for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: ProviderKind,
    pub description: &'static str,
    pub context_length: u32,
    pub supports_generation: bool,
    pub supports_evaluation: bool,
    /// USD
    pub cost_per_1k_input_tokens: f64,
    /// USD
    pub cost_per_1k_output_tokens: f64,
}

impl ModelInfo {
    pub fn supports(&self, role: ModelRole) -> bool {
        match role {
            ModelRole::Generation => self.supports_generation,
            ModelRole::Evaluation => self.supports_evaluation,
        }
    }

    /// Price of the given token usage in USD
    pub fn estimate_cost(&self, usage: TokenUsage) -> f64 {
        usage.input_tokens as f64 / 1000.0 * self.cost_per_1k_input_tokens
            + usage.output_tokens as f64 / 1000.0 * self.cost_per_1k_output_tokens
    }
}

pub static MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o-2024-08-06",
        name: "GPT-4o",
        provider: ProviderKind::OpenAi,
        description: "Most capable GPT-4 model, great for complex reasoning",
        context_length: 128_000,
        supports_generation: true,
        supports_evaluation: true,
        cost_per_1k_input_tokens: 0.0025,
        cost_per_1k_output_tokens: 0.01,
    },
    ModelInfo {
        id: "gpt-4o-mini-2024-07-18",
        name: "GPT-4o Mini",
        provider: ProviderKind::OpenAi,
        description: "Faster and more affordable GPT-4 model",
        context_length: 128_000,
        supports_generation: true,
        supports_evaluation: true,
        cost_per_1k_input_tokens: 0.00015,
        cost_per_1k_output_tokens: 0.0006,
    },
    ModelInfo {
        id: "gpt-4.1-nano-2025-04-14",
        name: "GPT-4.1 nano",
        provider: ProviderKind::OpenAi,
        description: "Fastest, most cost-efficient version of GPT-4.1",
        context_length: 128_000,
        supports_generation: true,
        supports_evaluation: true,
        cost_per_1k_input_tokens: 0.0001,
        cost_per_1k_output_tokens: 0.0004,
    },
    ModelInfo {
        id: "claude-sonnet-4-20250514",
        name: "Claude 4 Sonnet",
        provider: ProviderKind::Claude,
        description: "Optimal balance of intelligence, cost, and speed",
        context_length: 200_000,
        supports_generation: true,
        supports_evaluation: true,
        cost_per_1k_input_tokens: 0.003,
        cost_per_1k_output_tokens: 0.015,
    },
    ModelInfo {
        id: "claude-3-5-haiku-20241022",
        name: "Claude 3.5 Haiku",
        provider: ProviderKind::Claude,
        description: "Fastest, most cost-effective Claude model",
        context_length: 200_000,
        supports_generation: true,
        supports_evaluation: true,
        cost_per_1k_input_tokens: 0.0008,
        cost_per_1k_output_tokens: 0.004,
    },
];

pub fn model_info(provider: ProviderKind, model_id: &str) -> Option<&'static ModelInfo> {
    MODELS
        .iter()
        .find(|m| m.provider == provider && m.id == model_id)
}

pub fn models_for(provider: ProviderKind) -> impl Iterator<Item = &'static ModelInfo> {
    MODELS.iter().filter(move |m| m.provider == provider)
}

pub fn generation_models() -> impl Iterator<Item = &'static ModelInfo> {
    MODELS.iter().filter(|m| m.supports_generation)
}

pub fn evaluation_models() -> impl Iterator<Item = &'static ModelInfo> {
    MODELS.iter().filter(|m| m.supports_evaluation)
}

/// An explicit (provider, model) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelector {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelSelector {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Build a selector from the string pair carried by requests and settings
    pub fn parse(provider: &str, model: &str) -> Result<Self, EvalError> {
        Ok(Self::new(provider.parse()?, model.trim()))
    }

    /// Look the selector up in the catalog for the given role
    pub fn catalog_entry(&self, role: ModelRole) -> Result<&'static ModelInfo, EvalError> {
        let info = model_info(self.provider, &self.model).ok_or_else(|| {
            EvalError::Configuration(format!(
                "Model {} not found for provider {}",
                self.model, self.provider
            ))
        })?;

        if !info.supports(role) {
            return Err(EvalError::Configuration(format!(
                "Model {} of provider {} cannot be used for {}",
                self.model, self.provider, role
            )));
        }
        Ok(info)
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
