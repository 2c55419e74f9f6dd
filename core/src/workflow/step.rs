// orderflow/src/workflow/step.rs

use super::context_data::ContextData;
use super::control::StepControl;
use std::future::Future;
use std::pin::Pin;

/// An asynchronous step handler.
///
/// Handlers receive a clone of the shared context, must release any lock guard
/// before awaiting, and return whether the pipeline should continue.
pub type Handler<TData, Err> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync>;

/// Undo action for a completed step. Compensations cannot fail the pipeline;
/// they log their own problems.
pub type Compensator<TData> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct StepDef {
  pub name: String,
  /// An optional step with no handlers is skipped instead of failing the run.
  pub optional: bool,
}
