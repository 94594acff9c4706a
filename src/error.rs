use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path of the offending field, e.g. `prompts[2]` or `criteria`
    pub field: String,
    /// Human readable explanation
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors produced while evaluating prompts.
///
/// `Configuration` and `Validation` abort a whole request. `Generation` and
/// `Judge` describe a single failed capability call; the orchestrator absorbs
/// them into degraded results instead of returning them.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("judge failed: {0}")]
    Judge(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),
}

impl EvalError {
    /// Field-level messages when this is a validation error
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            EvalError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type EvalResult<T> = Result<T, EvalError>;
