//! Pure reductions from judge results to generation scores and from
//! generation scores to prompt scores.

use std::collections::HashMap;

use crate::models::{
    EvaluationCriterion, EvaluationResult, GenerationEvaluationResult, PromptResult, clamp_score,
};

/// Reasoning recorded when a judge result has no entry for a criterion
pub const MISSING_REASONING: &str = "No reasoning available";

/// Prompts whose total score is this close to the best one share the top rank
pub const TIE_TOLERANCE: f64 = 0.001;

/// Per-criterion reduction of one generation's judge results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JudgeAggregate {
    pub scores: HashMap<String, f64>,
    pub reasoning: HashMap<String, Vec<String>>,
}

/// Per-criterion reduction of all generations of one prompt
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromptAggregate {
    pub final_scores: HashMap<String, f64>,
    /// Only present when more than one generation contributed
    pub std_devs: Option<HashMap<String, f64>>,
    pub total_score: f64,
}

/// Mean score and ordered reasoning per criterion.
///
/// A result missing a criterion counts as score 0 with reasoning
/// [`MISSING_REASONING`].
pub fn aggregate_judge_results(
    results: &[EvaluationResult],
    criteria: &[EvaluationCriterion],
) -> JudgeAggregate {
    let mut aggregate = JudgeAggregate::default();

    for criterion in criteria {
        let name = &criterion.name;
        let scores: Vec<f64> = results
            .iter()
            .map(|r| r.scores.get(name).copied().map(clamp_score).unwrap_or(0.0))
            .collect();
        let reasoning: Vec<String> = results
            .iter()
            .map(|r| {
                r.reasoning
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| MISSING_REASONING.to_string())
            })
            .collect();

        aggregate.scores.insert(name.clone(), mean(&scores));
        aggregate.reasoning.insert(name.clone(), reasoning);
    }

    aggregate
}

/// Final scores, dispersion and weighted total across generations.
///
/// With no generations every final score is 0 and there is no dispersion.
/// Weights are used as given, never renormalized.
pub fn aggregate_prompt_results(
    generations: &[GenerationEvaluationResult],
    criteria: &[EvaluationCriterion],
) -> PromptAggregate {
    let mut final_scores = HashMap::new();
    let mut std_devs = HashMap::new();
    let mut total_score = 0.0;

    for criterion in criteria {
        let name = &criterion.name;
        let scores: Vec<f64> = generations
            .iter()
            .map(|g| g.aggregated_scores.get(name).copied().unwrap_or(0.0))
            .collect();

        let mean_score = mean(&scores);
        total_score += mean_score * criterion.weight;
        final_scores.insert(name.clone(), mean_score);
        if let Some(std_dev) = sample_std_dev(&scores) {
            std_devs.insert(name.clone(), std_dev);
        }
    }

    PromptAggregate {
        final_scores,
        std_devs: (generations.len() > 1).then_some(std_devs),
        total_score,
    }
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N - 1 denominator), undefined below two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Ids of every prompt whose total score is within [`TIE_TOLERANCE`] of the best
pub fn best_prompt_ids(results: &[PromptResult]) -> Vec<String> {
    let best = results
        .iter()
        .map(|r| r.total_score)
        .fold(f64::NEG_INFINITY, f64::max);

    results
        .iter()
        .filter(|r| best - r.total_score <= TIE_TOLERANCE)
        .map(|r| r.prompt_id.clone())
        .collect()
}
