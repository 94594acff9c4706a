use crate::error::{EvalError, EvalResult, FieldError};
use crate::models::EvaluationRequest;
use std::collections::HashSet;

pub const MAX_PROMPTS: usize = 10;
pub const MAX_COUNT: u32 = 10;
/// Allowed distance of the criteria weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 0.001;

impl EvaluationRequest {
    /// Check the request preconditions, reporting every violation at once
    pub fn validate(&self) -> EvalResult<()> {
        let mut errors = Vec::new();

        self.check_prompts(&mut errors);
        if self.test_input.trim().is_empty() {
            errors.push(FieldError::new("test_input", "must not be empty"));
        }
        check_count("generation_count", self.generation_count, &mut errors);
        check_count("evaluation_count", self.evaluation_count, &mut errors);
        self.check_criteria(&mut errors);
        check_override_pair(
            ("generation_provider", &self.generation_provider),
            ("generation_model", &self.generation_model),
            &mut errors,
        );
        check_override_pair(
            ("evaluation_provider", &self.evaluation_provider),
            ("evaluation_model", &self.evaluation_model),
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EvalError::Validation(errors))
        }
    }

    fn check_prompts(&self, errors: &mut Vec<FieldError>) {
        if self.prompts.is_empty() {
            errors.push(FieldError::new("prompts", "at least 1 prompt is required"));
        } else if self.prompts.len() > MAX_PROMPTS {
            errors.push(FieldError::new(
                "prompts",
                format!("at most {} prompts are allowed", MAX_PROMPTS),
            ));
        }

        for (index, prompt) in self.prompts.iter().enumerate() {
            if prompt.trim().is_empty() {
                errors.push(FieldError::new(format!("prompts[{}]", index), "must not be empty"));
            }
        }
    }

    fn check_criteria(&self, errors: &mut Vec<FieldError>) {
        if self.criteria.is_empty() {
            errors.push(FieldError::new("criteria", "at least 1 criterion is required"));
            return;
        }

        let mut seen = HashSet::new();
        for (index, criterion) in self.criteria.iter().enumerate() {
            let field = format!("criteria[{}]", index);
            if criterion.name.trim().is_empty() {
                errors.push(FieldError::new(format!("{}.name", field), "must not be empty"));
            } else if !seen.insert(criterion.name.as_str()) {
                errors.push(FieldError::new(
                    format!("{}.name", field),
                    format!("duplicate criterion name '{}'", criterion.name),
                ));
            }
            if !(0.0..=1.0).contains(&criterion.weight) {
                errors.push(FieldError::new(
                    format!("{}.weight", field),
                    "must be between 0 and 1",
                ));
            }
        }

        let total: f64 = self.criteria.iter().map(|c| c.weight).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            errors.push(FieldError::new(
                "criteria",
                format!("weights must sum to 1.0, got {:.3}", total),
            ));
        }
    }
}

fn check_count(field: &str, value: u32, errors: &mut Vec<FieldError>) {
    if !(1..=MAX_COUNT).contains(&value) {
        errors.push(FieldError::new(
            field,
            format!("must be between 1 and {}", MAX_COUNT),
        ));
    }
}

/// Provider and model overrides only make sense together
fn check_override_pair(
    provider: (&str, &Option<String>),
    model: (&str, &Option<String>),
    errors: &mut Vec<FieldError>,
) {
    match (provider.1, model.1) {
        (Some(_), None) => errors.push(FieldError::new(
            model.0,
            format!("required when {} is set", provider.0),
        )),
        (None, Some(_)) => errors.push(FieldError::new(
            provider.0,
            format!("required when {} is set", model.0),
        )),
        _ => {}
    }
}
