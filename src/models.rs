use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Scale the judge is asked to score a criterion on.
///
/// Whatever the scale, scores are normalized to `[0, 1]` before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    #[default]
    Continuous,
    Binary,
    Likert,
}

impl ScoreType {
    /// Scale description shown to the judge
    pub fn scale_hint(self) -> &'static str {
        match self {
            ScoreType::Continuous => "a number from 0.0 to 1.0 (1.0 is perfect, 1 decimal only)",
            ScoreType::Binary => "either 0 (fails) or 1 (passes)",
            ScoreType::Likert => "an integer from 1 (very poor) to 5 (excellent)",
        }
    }

    /// Map a raw judge score onto `[0, 1]`
    pub fn normalize(self, raw: f64) -> f64 {
        let value = match self {
            ScoreType::Continuous => raw,
            ScoreType::Binary => {
                if raw >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ScoreType::Likert => (raw - 1.0) / 4.0,
        };
        clamp_score(value)
    }
}

/// Clamp a score into `[0, 1]`, mapping non-finite values to 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// A named, weighted evaluation dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub name: String,
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub score_type: ScoreType,
}

impl EvaluationCriterion {
    pub fn new(name: impl Into<String>, description: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight,
            score_type: ScoreType::Continuous,
        }
    }

    pub fn with_score_type(mut self, score_type: ScoreType) -> Self {
        self.score_type = score_type;
        self
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Criteria used when a request does not name any
pub fn default_criteria() -> Vec<EvaluationCriterion> {
    vec![
        EvaluationCriterion::new(
            "accuracy",
            "How factually correct is the response?",
            0.4,
        ),
        EvaluationCriterion::new(
            "relevance",
            "How well does the response address the input?",
            0.3,
        ),
        EvaluationCriterion::new(
            "clarity",
            "How clear and well organized is the response?",
            0.3,
        ),
    ]
}

fn default_count() -> u32 {
    3
}

/// An evaluation request as received at the boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Candidate prompts, evaluated independently
    pub prompts: Vec<String>,
    /// Input every prompt is tested against
    pub test_input: String,
    /// Optional reference answer shown to the judge
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default = "default_criteria")]
    pub criteria: Vec<EvaluationCriterion>,
    /// Generations per prompt
    #[serde(default = "default_count")]
    pub generation_count: u32,
    /// Judge calls per generation
    #[serde(default = "default_count")]
    pub evaluation_count: u32,
    #[serde(default)]
    pub generation_provider: Option<String>,
    #[serde(default)]
    pub generation_model: Option<String>,
    #[serde(default)]
    pub evaluation_provider: Option<String>,
    #[serde(default)]
    pub evaluation_model: Option<String>,
}

impl EvaluationRequest {
    /// Request with default criteria and counts
    pub fn new(prompts: Vec<String>, test_input: impl Into<String>) -> Self {
        Self {
            prompts,
            test_input: test_input.into(),
            expected_output: None,
            criteria: default_criteria(),
            generation_count: default_count(),
            evaluation_count: default_count(),
            generation_provider: None,
            generation_model: None,
            evaluation_provider: None,
            evaluation_model: None,
        }
    }

    /// Load a request from a JSON (`.json`) or TOML (anything else) file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON request: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML request: {}", path.display()))
        }
    }
}

/// Token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Output of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub generation_id: String,
    pub prompt_id: String,
    pub output: String,
    /// Seconds
    pub generation_time: f64,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Output of one judge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluation_id: String,
    /// Criterion name to score in `[0, 1]`
    pub scores: HashMap<String, f64>,
    /// Criterion name to the judge's reasoning
    pub reasoning: HashMap<String, String>,
    /// Seconds
    pub evaluation_time: f64,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Set when the judge call failed and this is a zero-score placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One generation together with all of its judge results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvaluationResult {
    pub generation_result: GenerationResult,
    pub evaluation_results: Vec<EvaluationResult>,
    /// Mean score per criterion across `evaluation_results`
    pub aggregated_scores: HashMap<String, f64>,
    /// Reasoning per criterion, in `evaluation_results` order
    pub aggregated_reasoning: HashMap<String, Vec<String>>,
}

/// Aggregated result for one candidate prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    pub prompt_id: String,
    pub prompt: String,
    /// Successful generations in launch order
    pub generation_evaluation_results: Vec<GenerationEvaluationResult>,
    pub final_scores: HashMap<String, f64>,
    /// Sample standard deviation across generations, only when more than one contributed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_std_devs: Option<HashMap<String, f64>>,
    pub total_score: f64,
    /// Sum of every generation and judge latency for this prompt, in seconds
    pub execution_time: f64,
    /// Requested generations
    pub generation_count: u32,
    /// Requested judge calls per generation
    pub evaluation_count: u32,
    /// Generations that produced output and were scored
    pub completed_generations: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generation_errors: Vec<String>,
    #[serde(default)]
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    #[default]
    Completed,
}

/// Complete response for one evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub evaluation_id: String,
    pub timestamp: DateTime<Utc>,
    /// One entry per input prompt, in input order
    pub results: Vec<PromptResult>,
    pub criteria: Vec<EvaluationCriterion>,
    pub status: EvaluationStatus,
    pub generation_provider: String,
    pub generation_model: String,
    pub evaluation_provider: String,
    pub evaluation_model: String,
}

impl EvaluationResponse {
    /// Ids of the prompt(s) sharing the top total score
    pub fn best_prompt_ids(&self) -> Vec<String> {
        crate::aggregate::best_prompt_ids(&self.results)
    }

    /// Results ordered by descending total score; ties keep input order
    pub fn ranked(&self) -> Vec<&PromptResult> {
        let mut ranked: Vec<&PromptResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}
