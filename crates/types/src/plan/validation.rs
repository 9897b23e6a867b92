//! Structural plan validation.
//!
//! The serde layer already rejects unknown actions, check kinds, and
//! condition statuses. What remains here are the constraints the schema
//! cannot express: non-empty navigation URLs and well-formed timer-check
//! expressions. Validation runs once at load time so a malformed plan fails
//! before the target is ever launched.

use thiserror::Error;

use super::{Plan, Step, TimerComparison};

/// A configuration error found while validating a decoded plan.
#[derive(Debug, Error)]
pub enum PlanValidationError {
    #[error("navigate step for window '{window}' has an empty url")]
    EmptyNavigateUrl { window: String },

    #[error("timer-check expression is malformed: {reason}")]
    MalformedTimerCheck { reason: String },

    #[error("repeat '{tag}' has an empty step list")]
    EmptyRepeatBody { tag: String },
}

/// Validate a plan after decoding, before execution.
pub fn validate_plan(plan: &Plan) -> Result<(), PlanValidationError> {
    validate_steps(&plan.steps)
}

fn validate_steps(steps: &[Step]) -> Result<(), PlanValidationError> {
    for step in steps {
        match step {
            Step::Navigate { window, url } => {
                if url.trim().is_empty() {
                    return Err(PlanValidationError::EmptyNavigateUrl { window: window.clone() });
                }
            }
            Step::TimerCheck { condition } => {
                condition
                    .parse::<TimerComparison>()
                    .map_err(|reason| PlanValidationError::MalformedTimerCheck { reason })?;
            }
            Step::Repeat { tag, steps, .. } => {
                if steps.is_empty() {
                    return Err(PlanValidationError::EmptyRepeatBody { tag: tag.clone() });
                }
                validate_steps(steps)?;
            }
            _ => {}
        }
    }
    Ok(())
}
