//! Run-level errors.
//!
//! Per-step failures are data (`StepResult`), not errors; this type
//! only covers failures that prevent a run from starting at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// The scenario failed structural validation.
    #[error("invalid scenario: {0}")]
    Validation(String),
}
