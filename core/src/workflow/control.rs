// orderflow/src/workflow/control.rs

//! Signals for controlling pipeline flow and the outcome of a pipeline run.

/// Returned by a step handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  Continue,
  /// Halt the pipeline gracefully. Completed steps are *not* compensated;
  /// stopping is a business outcome, not a failure.
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
  Completed,
  Stopped,
}
