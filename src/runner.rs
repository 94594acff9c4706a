use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Settings;
use crate::models::{EvaluationRequest, EvaluationResponse};
use crate::orchestrator::Orchestrator;

/// CLI boundary around the orchestrator: loads requests, stores responses
pub struct Runner {
    orchestrator: Orchestrator,
    store_path: Option<PathBuf>,
}

impl Runner {
    /// Create a runner with every provider configured in `settings`
    pub fn new(settings: &Settings, store_path: Option<PathBuf>) -> Self {
        Self::with_orchestrator(Orchestrator::from_settings(settings), store_path)
    }

    pub fn with_orchestrator(orchestrator: Orchestrator, store_path: Option<PathBuf>) -> Self {
        Self {
            orchestrator,
            store_path,
        }
    }

    /// Load a request file and evaluate it
    pub async fn run_file(&self, request_path: &Path) -> Result<EvaluationResponse> {
        let request = EvaluationRequest::from_file(request_path)?;
        info!("Loaded request from {}", request_path.display());
        self.run(&request).await
    }

    /// Evaluate `request`, storing the response when a store path is set.
    ///
    /// Validation and configuration errors keep their [`crate::EvalError`]
    /// type so callers can downcast and report field-level messages.
    pub async fn run(&self, request: &EvaluationRequest) -> Result<EvaluationResponse> {
        let response = self.orchestrator.evaluate(request).await?;

        if let Some(path) = &self.store_path {
            store_results(&response, path)?;
        }

        Ok(response)
    }
}

/// Store a response as pretty JSON, creating parent directories
pub fn store_results(response: &EvaluationResponse, path: &Path) -> Result<()> {
    let json_content =
        serde_json::to_string_pretty(response).context("Failed to serialize results to JSON")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, json_content)
        .with_context(|| format!("Failed to write results to: {}", path.display()))?;

    info!("Results stored to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::catalog::ProviderKind;
    use crate::config::{DefaultModels, Limits};
    use crate::error::EvalError;
    use crate::test_support::StubCapability;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn stub_runner(store_path: Option<PathBuf>) -> Runner {
        let registry =
            CapabilityRegistry::new().with(ProviderKind::OpenAi, Arc::new(StubCapability::new()));
        let orchestrator =
            Orchestrator::new(registry, DefaultModels::default(), &Limits::default());
        Runner::with_orchestrator(orchestrator, store_path)
    }

    fn write_request(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_file_and_store() {
        let temp_dir = tempdir().unwrap();
        let store_path = temp_dir.path().join("nested").join("directory").join("results.json");
        let request_path = write_request(
            temp_dir.path(),
            "request.toml",
            r#"
prompts = ["You are a geography tutor.", "Answer in one word."]
test_input = "What is the capital of France?"
generation_count = 2
evaluation_count = 1
"#,
        );

        let runner = stub_runner(Some(store_path.clone()));
        let response = runner.run_file(&request_path).await.unwrap();
        assert_eq!(response.results.len(), 2);

        assert!(store_path.exists());
        let content = std::fs::read_to_string(&store_path).unwrap();
        let stored: EvaluationResponse = serde_json::from_str(&content).unwrap();
        assert_eq!(stored.evaluation_id, response.evaluation_id);
        assert_eq!(stored.results[1].prompt, "Answer in one word.");
    }

    #[tokio::test]
    async fn test_run_without_store_path() {
        let temp_dir = tempdir().unwrap();
        let request_path = write_request(
            temp_dir.path(),
            "request.json",
            r#"{"prompts": ["Be brief."], "test_input": "2+2?", "generation_count": 1, "evaluation_count": 1}"#,
        );

        let response = stub_runner(None).run_file(&request_path).await.unwrap();
        assert_eq!(response.results[0].completed_generations, 1);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_is_downcastable() {
        let mut request = EvaluationRequest::new(vec![], "What is the capital of France?");
        request.generation_count = 0;

        let err = stub_runner(None).run(&request).await.unwrap_err();
        let eval_error = err.downcast_ref::<EvalError>().unwrap();
        let fields: Vec<&str> = eval_error
            .field_errors()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["prompts", "generation_count"]);
    }

    #[tokio::test]
    async fn test_missing_request_file() {
        let result = stub_runner(None).run_file(Path::new("/nonexistent/request.toml")).await;
        assert!(result.unwrap_err().to_string().contains("Failed to read request file"));
    }

    #[tokio::test]
    async fn test_store_results_unwritable_path() {
        let response = stub_runner(None)
            .run(&EvaluationRequest::new(vec!["Be brief.".to_string()], "2+2?"))
            .await
            .unwrap();

        let result =
            store_results(&response, Path::new("/dev/null/invalid_path_that_cannot_exist"));
        assert!(result.is_err());
    }
}
