// orderflow/src/workflow/error.rs
use thiserror::Error;

use crate::error::OrderError;

/// Errors raised by the pipeline machinery itself, as opposed to its handlers.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Step '{step_name}' did not leave the expected state: {message}")]
  MissingState { step_name: String, message: String },
}

impl From<WorkflowError> for OrderError {
  fn from(err: WorkflowError) -> Self {
    let step_name = match &err {
      WorkflowError::HandlerMissing { step_name }
      | WorkflowError::MissingState { step_name, .. } => step_name.clone(),
    };
    OrderError::Workflow {
      step_name,
      message: err.to_string(),
    }
  }
}
