//! Deterministic in-process capabilities for orchestrator tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::capability::{Generation, Judgement, ModelCapability};
use crate::error::{EvalError, EvalResult};
use crate::judge::JudgeRequest;
use crate::models::TokenUsage;

type GenerateFn = dyn Fn(&str, usize) -> EvalResult<String> + Send + Sync;
type JudgeFn =
    dyn Fn(&JudgeRequest<'_>, usize) -> EvalResult<HashMap<String, f64>> + Send + Sync;
type DelayFn = dyn Fn(usize) -> Duration + Send + Sync;

pub const GENERATION_USAGE: TokenUsage = TokenUsage {
    input_tokens: 100,
    output_tokens: 50,
};

pub const JUDGE_USAGE: TokenUsage = TokenUsage {
    input_tokens: 200,
    output_tokens: 20,
};

/// Stub capability.
///
/// By default every generation returns "Paris" and every judge call scores
/// 0.92 on every criterion. Closures receive the zero-based call index.
pub struct StubCapability {
    generate_fn: Box<GenerateFn>,
    judge_fn: Box<JudgeFn>,
    generate_delay: Box<DelayFn>,
    judge_delay: Box<DelayFn>,
    generation_latency: Duration,
    judge_latency: Duration,
    generate_calls: AtomicUsize,
    judge_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubCapability {
    pub fn new() -> Self {
        Self {
            generate_fn: Box::new(|_: &str, _: usize| Ok("Paris".to_string())),
            judge_fn: Box::new(|request: &JudgeRequest<'_>, _: usize| {
                Ok(uniform_scores(request, 0.92))
            }),
            generate_delay: Box::new(|_: usize| Duration::ZERO),
            judge_delay: Box::new(|_: usize| Duration::ZERO),
            generation_latency: Duration::from_millis(100),
            judge_latency: Duration::from_millis(50),
            generate_calls: AtomicUsize::new(0),
            judge_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_generate(
        mut self,
        f: impl Fn(&str, usize) -> EvalResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.generate_fn = Box::new(f);
        self
    }

    pub fn with_judge(
        mut self,
        f: impl Fn(&JudgeRequest<'_>, usize) -> EvalResult<HashMap<String, f64>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.judge_fn = Box::new(f);
        self
    }

    pub fn with_generate_delay(
        mut self,
        f: impl Fn(usize) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.generate_delay = Box::new(f);
        self
    }

    pub fn with_judge_delay(
        mut self,
        f: impl Fn(usize) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.judge_delay = Box::new(f);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn judge_calls(&self) -> usize {
        self.judge_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, delay: Duration) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelCapability for StubCapability {
    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _test_input: &str,
    ) -> EvalResult<Generation> {
        let index = self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.enter((self.generate_delay)(index)).await;

        let output = (self.generate_fn)(prompt, index)?;
        if output.trim().is_empty() {
            return Err(EvalError::Generation("stub returned empty output".to_string()));
        }
        Ok(Generation {
            output,
            latency: self.generation_latency,
            usage: GENERATION_USAGE,
        })
    }

    async fn judge(&self, _model: &str, request: &JudgeRequest<'_>) -> EvalResult<Judgement> {
        let index = self.judge_calls.fetch_add(1, Ordering::SeqCst);
        self.enter((self.judge_delay)(index)).await;

        let scores = (self.judge_fn)(request, index)?;
        let reasoning = scores
            .keys()
            .map(|name| (name.clone(), format!("{} looks right for {}", request.output, name)))
            .collect();
        Ok(Judgement {
            scores,
            reasoning,
            latency: self.judge_latency,
            usage: JUDGE_USAGE,
        })
    }
}

/// The same score for every criterion of the request
pub fn uniform_scores(request: &JudgeRequest<'_>, score: f64) -> HashMap<String, f64> {
    request
        .criteria
        .iter()
        .map(|c| (c.name.clone(), score))
        .collect()
}
