use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::catalog::{MODELS, ModelInfo};
use crate::models::{EvaluationResponse, PromptResult};

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print an evaluation response in the specified format
pub fn print_response(response: &EvaluationResponse, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_plain(response)),
        OutputFormat::Json => print_json(response),
    }
}

/// Print the model catalog in the specified format
pub fn print_models(format: OutputFormat) {
    match format {
        OutputFormat::Plain => print!("{}", render_models_plain(MODELS)),
        OutputFormat::Json => print_json(MODELS),
    }
}

/// Prompts ranked by total score, best ones marked
pub fn render_plain(response: &EvaluationResponse) -> String {
    let mut out = String::new();
    let best = response.best_prompt_ids();

    let _ = writeln!(out, "=== Evaluation {} ===", response.evaluation_id);
    let _ = writeln!(
        out,
        "Generation: {}/{}   Judge: {}/{}",
        response.generation_provider,
        response.generation_model,
        response.evaluation_provider,
        response.evaluation_model
    );
    let _ = writeln!(out);

    for (rank, result) in response.ranked().into_iter().enumerate() {
        let marker = if best.contains(&result.prompt_id) { " 🏆" } else { "" };
        let _ = writeln!(out, "#{} total {:.3}{}", rank + 1, result.total_score, marker);
        let _ = writeln!(out, "Prompt: {}", result.prompt);
        let _ = writeln!(
            out,
            "Generations: {}/{} completed, {} judge call(s) each, {:.2}s, ~${:.4}",
            result.completed_generations,
            result.generation_count,
            result.evaluation_count,
            result.execution_time,
            result.estimated_cost_usd
        );
        write_scores(&mut out, response, result);
        for error in &result.generation_errors {
            let _ = writeln!(out, "  ! {}", error);
        }
        let _ = writeln!(out);
    }

    out
}

/// Per-criterion table in request order
fn write_scores(out: &mut String, response: &EvaluationResponse, result: &PromptResult) {
    let _ = writeln!(out, "  {:<15} {:<8} {:<8} {:<8}", "Criterion", "Weight", "Mean", "StdDev");
    for criterion in &response.criteria {
        let mean = result.final_scores.get(&criterion.name).copied().unwrap_or(0.0);
        let std_dev = result
            .score_std_devs
            .as_ref()
            .and_then(|devs| devs.get(&criterion.name))
            .map(|d| format!("{:.3}", d))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<15} {:<8.2} {:<8.3} {:<8}",
            criterion.name, criterion.weight, mean, std_dev
        );
    }
}

/// One line per catalog model
pub fn render_models_plain(models: &[ModelInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<18} {:<28} {:<18} {:<10} {:<10}",
        "Provider", "Model", "Name", "$/1k in", "$/1k out"
    );
    let _ = writeln!(out, "{}", "-".repeat(88));
    for model in models {
        let _ = writeln!(
            out,
            "{:<18} {:<28} {:<18} {:<10} {:<10}",
            model.provider.display_name(),
            model.id,
            model.name,
            model.cost_per_1k_input_tokens,
            model.cost_per_1k_output_tokens
        );
    }
    out
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationCriterion, EvaluationStatus};
    use chrono::Utc;
    use std::collections::HashMap;

    fn prompt_result(id: &str, total_score: f64, std_dev: Option<f64>) -> PromptResult {
        PromptResult {
            prompt_id: id.to_string(),
            prompt: format!("Prompt {}", id),
            generation_evaluation_results: vec![],
            final_scores: HashMap::from([("accuracy".to_string(), total_score)]),
            score_std_devs: std_dev.map(|d| HashMap::from([("accuracy".to_string(), d)])),
            total_score,
            execution_time: 1.5,
            generation_count: 2,
            evaluation_count: 1,
            completed_generations: 2,
            generation_errors: vec![],
            estimated_cost_usd: 0.0012,
        }
    }

    fn create_test_response() -> EvaluationResponse {
        EvaluationResponse {
            evaluation_id: "eval-1".to_string(),
            timestamp: Utc::now(),
            results: vec![
                prompt_result("p1", 0.7, Some(0.05)),
                prompt_result("p2", 0.9, None),
                prompt_result("p3", 0.9, None),
            ],
            criteria: vec![EvaluationCriterion::new("accuracy", "Is it right?", 1.0)],
            status: EvaluationStatus::Completed,
            generation_provider: "openai".to_string(),
            generation_model: "gpt-4o-mini-2024-07-18".to_string(),
            evaluation_provider: "claude".to_string(),
            evaluation_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }

    #[test]
    fn test_plain_output_ranks_and_marks_ties() {
        let text = render_plain(&create_test_response());

        assert!(text.contains("=== Evaluation eval-1 ==="));
        assert!(text.contains("Judge: claude/claude-3-5-haiku-20241022"));
        assert!(text.contains("#1 total 0.900 🏆\nPrompt: Prompt p2"));
        assert!(text.contains("#2 total 0.900 🏆\nPrompt: Prompt p3"));
        assert!(text.contains("#3 total 0.700\nPrompt: Prompt p1"));
        assert!(text.contains("0.050"));
    }

    #[test]
    fn test_plain_output_lists_generation_errors() {
        let mut response = create_test_response();
        response.results[0].generation_errors = vec!["generation failed: timeout".to_string()];
        response.results[0].completed_generations = 1;

        let text = render_plain(&response);
        assert!(text.contains("1/2 completed"));
        assert!(text.contains("  ! generation failed: timeout"));
    }

    #[test]
    fn test_models_listing() {
        let text = render_models_plain(MODELS);
        assert!(text.contains("gpt-4o-mini-2024-07-18"));
        assert!(text.contains("claude-sonnet-4-20250514"));
        assert!(text.lines().any(|line| line.starts_with("OpenAI ")));
        assert!(text.lines().any(|line| line.starts_with("Anthropic Claude ")));
        assert_eq!(text.lines().count(), MODELS.len() + 2);
    }

    #[test]
    fn test_json_output() {
        // serialization must not panic
        print_response(&create_test_response(), OutputFormat::Json);
        print_models(OutputFormat::Json);
    }
}
