//! Evaluation orchestration: fan out generations and judge calls, fold the
//! outcomes through the aggregator and assemble the response.

use chrono::Utc;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate_judge_results, aggregate_prompt_results};
use crate::capability::{CapabilityRegistry, ResolvedModel};
use crate::catalog::{ModelRole, ModelSelector};
use crate::config::{DefaultModels, Limits, Settings};
use crate::error::{EvalError, EvalResult};
use crate::judge::JudgeRequest;
use crate::models::{
    EvaluationRequest, EvaluationResponse, EvaluationResult, EvaluationStatus,
    GenerationEvaluationResult, GenerationResult, PromptResult, TokenUsage,
};

/// Runs evaluation requests against the registered capabilities.
///
/// Holds no per-request state; the semaphore bounds in-flight capability
/// calls across everything this orchestrator is running.
pub struct Orchestrator {
    registry: CapabilityRegistry,
    defaults: DefaultModels,
    limiter: Semaphore,
}

/// Everything one request's tasks share, read-only
struct RunContext<'a> {
    request: &'a EvaluationRequest,
    generation: &'a ResolvedModel,
    evaluation: &'a ResolvedModel,
}

/// How a single generation ended up
enum GenerationOutcome {
    Completed(GenerationEvaluationResult),
    Failed { error: EvalError, elapsed: Duration },
}

impl Orchestrator {
    pub fn new(registry: CapabilityRegistry, defaults: DefaultModels, limits: &Limits) -> Self {
        Self {
            registry,
            defaults,
            limiter: Semaphore::new(limits.max_concurrent_requests.max(1)),
        }
    }

    /// Orchestrator backed by every provider configured in `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            CapabilityRegistry::from_settings(settings),
            settings.defaults.clone(),
            &settings.limits,
        )
    }

    /// Evaluate every prompt of `request`.
    ///
    /// Validation and model resolution happen before any capability call and
    /// abort the request. Failed generate/judge calls are absorbed into the
    /// result instead.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvalResult<EvaluationResponse> {
        request.validate()?;

        let generation = self.resolve(
            request.generation_provider.as_deref(),
            request.generation_model.as_deref(),
            ModelRole::Generation,
        )?;
        let evaluation = self.resolve(
            request.evaluation_provider.as_deref(),
            request.evaluation_model.as_deref(),
            ModelRole::Evaluation,
        )?;

        let evaluation_id = Uuid::new_v4().to_string();
        info!(
            "Evaluation {}: {} prompt(s), {} generation(s) x {} judge call(s)",
            evaluation_id,
            request.prompts.len(),
            request.generation_count,
            request.evaluation_count
        );
        info!(
            "Evaluation {}: generating with {}, judging with {}",
            evaluation_id,
            generation.selector,
            evaluation.selector
        );

        let context = RunContext {
            request,
            generation: &generation,
            evaluation: &evaluation,
        };

        let started = Instant::now();
        let results = join_all(
            request
                .prompts
                .iter()
                .map(|prompt| self.evaluate_prompt(&context, Uuid::new_v4().to_string(), prompt)),
        )
        .await;
        info!("Evaluation {} finished in {:?}", evaluation_id, started.elapsed());

        Ok(EvaluationResponse {
            evaluation_id,
            timestamp: Utc::now(),
            results,
            criteria: request.criteria.clone(),
            status: EvaluationStatus::Completed,
            generation_provider: generation.selector.provider.to_string(),
            generation_model: generation.selector.model.clone(),
            evaluation_provider: evaluation.selector.provider.to_string(),
            evaluation_model: evaluation.selector.model.clone(),
        })
    }

    /// The explicit override when both halves are given, the configured default otherwise
    fn resolve(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
        role: ModelRole,
    ) -> EvalResult<ResolvedModel> {
        let selector = match (provider, model) {
            (Some(provider), Some(model)) => ModelSelector::parse(provider, model)?,
            _ => match role {
                ModelRole::Generation => self.defaults.generation()?,
                ModelRole::Evaluation => self.defaults.evaluation()?,
            },
        };
        self.registry.resolve(&selector, role)
    }

    async fn evaluate_prompt(
        &self,
        context: &RunContext<'_>,
        prompt_id: String,
        prompt: &str,
    ) -> PromptResult {
        let request = context.request;
        let outcomes = join_all(
            (0..request.generation_count).map(|_| self.run_generation(context, &prompt_id, prompt)),
        )
        .await;

        let mut completed = Vec::with_capacity(outcomes.len());
        let mut generation_errors = Vec::new();
        let mut execution_time = 0.0;
        let mut generation_usage = TokenUsage::default();
        let mut judge_usage = TokenUsage::default();

        for outcome in outcomes {
            match outcome {
                GenerationOutcome::Completed(result) => {
                    execution_time += result.generation_result.generation_time;
                    generation_usage.add(result.generation_result.usage);
                    for evaluation in &result.evaluation_results {
                        execution_time += evaluation.evaluation_time;
                        judge_usage.add(evaluation.usage);
                    }
                    completed.push(result);
                }
                GenerationOutcome::Failed { error, elapsed } => {
                    execution_time += elapsed.as_secs_f64();
                    generation_errors.push(error.to_string());
                }
            }
        }

        let aggregate = aggregate_prompt_results(&completed, &request.criteria);
        let estimated_cost_usd = context.generation.info.estimate_cost(generation_usage)
            + context.evaluation.info.estimate_cost(judge_usage);

        info!(
            "Prompt {}: total score {:.3} from {}/{} generation(s)",
            prompt_id,
            aggregate.total_score,
            completed.len(),
            request.generation_count
        );

        PromptResult {
            prompt_id,
            prompt: prompt.to_string(),
            completed_generations: completed.len() as u32,
            generation_evaluation_results: completed,
            final_scores: aggregate.final_scores,
            score_std_devs: aggregate.std_devs,
            total_score: aggregate.total_score,
            execution_time,
            generation_count: request.generation_count,
            evaluation_count: request.evaluation_count,
            generation_errors,
            estimated_cost_usd,
        }
    }

    /// One generation followed by its judge calls
    async fn run_generation(
        &self,
        context: &RunContext<'_>,
        prompt_id: &str,
        prompt: &str,
    ) -> GenerationOutcome {
        let generation_id = Uuid::new_v4().to_string();
        let model = &context.generation.selector.model;

        // the clock starts once a permit is held so queueing is not latency
        let (generated, elapsed) = match self.limiter.acquire().await {
            Ok(_permit) => {
                let started = Instant::now();
                let generated = context
                    .generation
                    .capability
                    .generate(model, prompt, &context.request.test_input)
                    .await;
                (generated, started.elapsed())
            }
            Err(_) => (
                Err(EvalError::Generation("concurrency limiter closed".to_string())),
                Duration::ZERO,
            ),
        };

        let generation = match generated {
            Ok(generation) => generation,
            Err(error) => {
                warn!("Generation {} for prompt {} failed: {}", generation_id, prompt_id, error);
                return GenerationOutcome::Failed { error, elapsed };
            }
        };
        debug!(
            "Generation {} for prompt {} took {:?}",
            generation_id, prompt_id, generation.latency
        );

        let evaluation_results = join_all(
            (0..context.request.evaluation_count)
                .map(|_| self.run_judge(context, &generation.output)),
        )
        .await;
        let aggregate = aggregate_judge_results(&evaluation_results, &context.request.criteria);

        GenerationOutcome::Completed(GenerationEvaluationResult {
            generation_result: GenerationResult {
                generation_id,
                prompt_id: prompt_id.to_string(),
                output: generation.output,
                generation_time: generation.latency.as_secs_f64(),
                usage: generation.usage,
            },
            evaluation_results,
            aggregated_scores: aggregate.scores,
            aggregated_reasoning: aggregate.reasoning,
        })
    }

    /// One judge call; a failure becomes a zero-score placeholder
    async fn run_judge(&self, context: &RunContext<'_>, output: &str) -> EvaluationResult {
        let evaluation_id = Uuid::new_v4().to_string();
        let request = context.request;
        let judge_request = JudgeRequest {
            test_input: &request.test_input,
            output,
            expected_output: request.expected_output.as_deref(),
            criteria: &request.criteria,
        };

        let (judged, elapsed) = match self.limiter.acquire().await {
            Ok(_permit) => {
                let started = Instant::now();
                let judged = context
                    .evaluation
                    .capability
                    .judge(&context.evaluation.selector.model, &judge_request)
                    .await;
                (judged, started.elapsed())
            }
            Err(_) => (
                Err(EvalError::Judge("concurrency limiter closed".to_string())),
                Duration::ZERO,
            ),
        };

        match judged {
            Ok(judgement) => {
                debug!("Judge call {} took {:?}", evaluation_id, judgement.latency);
                EvaluationResult {
                    evaluation_id,
                    scores: judgement.scores,
                    reasoning: judgement.reasoning,
                    evaluation_time: judgement.latency.as_secs_f64(),
                    usage: judgement.usage,
                    error: None,
                }
            }
            Err(error) => {
                warn!("Judge call {} failed: {}", evaluation_id, error);
                let reasoning = format!("Evaluation failed: {}", error);
                EvaluationResult {
                    evaluation_id,
                    scores: request
                        .criteria
                        .iter()
                        .map(|c| (c.name.clone(), 0.0))
                        .collect(),
                    reasoning: request
                        .criteria
                        .iter()
                        .map(|c| (c.name.clone(), reasoning.clone()))
                        .collect(),
                    evaluation_time: elapsed.as_secs_f64(),
                    usage: TokenUsage::default(),
                    error: Some(error.to_string()),
                }
            }
        }
    }
}
