use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::catalog::{ModelSelector, ProviderKind};
use crate::error::EvalError;
use crate::providers::RetryPolicy;
use crate::providers::{claude, openai};

/// Models used when a request does not override them
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefaultModels {
    #[serde(default = "default_provider")]
    pub generation_provider: String,
    #[serde(default = "default_model")]
    pub generation_model: String,
    #[serde(default = "default_provider")]
    pub evaluation_provider: String,
    #[serde(default = "default_model")]
    pub evaluation_model: String,
}

impl DefaultModels {
    pub fn generation(&self) -> Result<ModelSelector, EvalError> {
        ModelSelector::parse(&self.generation_provider, &self.generation_model)
    }

    pub fn evaluation(&self) -> Result<ModelSelector, EvalError> {
        ModelSelector::parse(&self.evaluation_provider, &self.evaluation_model)
    }
}

impl Default for DefaultModels {
    fn default() -> Self {
        Self {
            generation_provider: default_provider(),
            generation_model: default_model(),
            evaluation_provider: default_provider(),
            evaluation_model: default_model(),
        }
    }
}

/// Concurrency, timeout and retry limits for capability calls
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Limits {
    /// Maximum in-flight generate/judge calls across a whole request
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Timeout for a single call attempt
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base, doubled on every retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Limits {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Sampling parameters for one kind of call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    /// Temperature (0.0 to 1.0)
    pub temperature: f32,
}

/// A `[generation]` or `[judge]` section as written; missing keys fall back
/// to the defaults of that section
#[derive(Debug, Deserialize)]
struct SamplingSection {
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl SamplingSection {
    fn or(self, fallback: SamplingConfig) -> SamplingConfig {
        SamplingConfig {
            max_tokens: self.max_tokens.unwrap_or(fallback.max_tokens),
            temperature: self.temperature.unwrap_or(fallback.temperature),
        }
    }
}

fn generation_sampling<'de, D>(deserializer: D) -> std::result::Result<SamplingConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SamplingSection::deserialize(deserializer)?.or(SamplingConfig::generation()))
}

fn judge_sampling<'de, D>(deserializer: D) -> std::result::Result<SamplingConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SamplingSection::deserialize(deserializer)?.or(SamplingConfig::judge()))
}

impl SamplingConfig {
    pub fn generation() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: 0.7,
        }
    }

    pub fn judge() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: 0.1,
        }
    }
}

/// Where to reach a provider and which environment variable holds its key
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key_env: String,
    pub base_url: String,
}

impl ProviderConfig {
    fn openai() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: openai::DEFAULT_BASE_URL.to_string(),
        }
    }

    fn claude() -> Self {
        Self {
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: claude::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Process-wide settings, threaded explicitly into the orchestrator
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub defaults: DefaultModels,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default = "SamplingConfig::generation", deserialize_with = "generation_sampling")]
    pub generation: SamplingConfig,
    #[serde(default = "SamplingConfig::judge", deserialize_with = "judge_sampling")]
    pub judge: SamplingConfig,
    #[serde(default = "ProviderConfig::openai")]
    pub openai: ProviderConfig,
    #[serde(default = "ProviderConfig::claude")]
    pub claude: ProviderConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            defaults: DefaultModels::default(),
            limits: Limits::default(),
            generation: SamplingConfig::generation(),
            judge: SamplingConfig::judge(),
            openai: ProviderConfig::openai(),
            claude: ProviderConfig::claude(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Settings from `path` when given, built-in defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Claude => &self.claude,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini-2024-07-18".to_string()
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_max_tokens() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_settings_parsing() {
        let toml_content = r#"
[defaults]
generation_provider = "anthropic"
generation_model = "claude-3-5-haiku-20241022"
evaluation_provider = "openai"
evaluation_model = "gpt-4o-2024-08-06"

[limits]
max_concurrent_requests = 4
request_timeout_secs = 30
max_retries = 0
retry_delay_ms = 250

[generation]
max_tokens = 800
temperature = 0.9

[claude]
api_key_env = "MY_CLAUDE_KEY"
base_url = "http://localhost:9000/v1"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        let generation = settings.defaults.generation().unwrap();
        assert_eq!(generation.provider, ProviderKind::Claude);
        assert_eq!(generation.model, "claude-3-5-haiku-20241022");
        assert_eq!(settings.limits.max_concurrent_requests, 4);
        assert_eq!(settings.limits.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.limits.retry_policy(), RetryPolicy::new(0, Duration::from_millis(250)));
        assert_eq!(settings.generation.max_tokens, 800);
        assert_eq!(settings.generation.temperature, 0.9);
        assert_eq!(settings.provider(ProviderKind::Claude).api_key_env, "MY_CLAUDE_KEY");
        // untouched sections keep their defaults
        assert_eq!(settings.judge, SamplingConfig::judge());
        assert_eq!(settings.provider(ProviderKind::OpenAi).api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_settings_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[limits]\nmax_retries = 5\n").unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.limits.max_retries, 5);
        assert_eq!(settings.limits.max_concurrent_requests, 10);
        assert_eq!(settings.limits.request_timeout_secs, 300);
        assert_eq!(settings.limits.retry_delay_ms, 5000);
        assert_eq!(settings.defaults, DefaultModels::default());
        assert_eq!(settings.generation.temperature, 0.7);
        assert_eq!(settings.judge.temperature, 0.1);
        assert_eq!(settings.judge.max_tokens, 500);
    }

    #[test]
    fn test_partial_sampling_sections() {
        let settings: Settings = toml::from_str("[judge]\nmax_tokens = 800\n").unwrap();
        assert_eq!(settings.judge.max_tokens, 800);
        assert_eq!(settings.judge.temperature, 0.1);
        assert_eq!(settings.generation, SamplingConfig::generation());

        let settings: Settings = toml::from_str("[generation]\ntemperature = 0.3\n").unwrap();
        assert_eq!(settings.generation.temperature, 0.3);
        assert_eq!(settings.generation.max_tokens, 500);
        assert_eq!(settings.judge, SamplingConfig::judge());
    }

    #[test]
    fn test_settings_missing_file() {
        let result = Settings::from_file(Path::new("/nonexistent/settings.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_settings_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[limits\nmax_retries = ").unwrap();

        let result = Settings::from_file(temp_file.path());
        assert!(result.unwrap_err().to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_default_provider() {
        let defaults = DefaultModels {
            evaluation_provider: "mistral".to_string(),
            ..DefaultModels::default()
        };
        assert!(matches!(defaults.evaluation(), Err(EvalError::Configuration(_))));
    }
}
