//! Compare candidate prompts by running each through a model several times
//! and scoring every output with an LLM judge.

pub mod aggregate;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod error;
pub mod judge;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod providers;
pub mod runner;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use capability::{CapabilityRegistry, ModelCapability};
pub use config::Settings;
pub use error::{EvalError, EvalResult, FieldError};
pub use models::{EvaluationRequest, EvaluationResponse};
pub use orchestrator::Orchestrator;
