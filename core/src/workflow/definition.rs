// orderflow/src/workflow/definition.rs

//! The `Pipeline<TData, Err>` definition and its construction API.

use super::context_data::ContextData;
use super::control::StepControl;
use super::error::WorkflowError;
use super::step::{Compensator, Handler, StepDef};
use std::collections::HashMap;
use std::future::Future;

/// A named sequence of steps over shared data `TData`, whose handlers fail
/// with `Err`.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) compensations: HashMap<String, Compensator<TData>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(step_name, optional)` pairs.
  pub fn new(name: impl Into<String>, step_defs: &[(&str, bool)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
      })
      .collect();

    Self {
      name: name.into(),
      steps,
      on: HashMap::new(),
      compensations: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// # Panics
  /// If the step is not declared. Handler registration happens once at
  /// startup, so a typo here is a programming error.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "Pipeline '{}' setup error: step '{}' not declared.",
        self.name, step_name
      );
    }
  }

  /// Registers a handler for a step. Several handlers on one step run in
  /// registration order.
  pub fn on_step<F, UserErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = Result<StepControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.on.entry(step_name.to_string()).or_default().push(handler);
    self
  }

  /// Registers the undo action for a step. Replaces any previous one.
  pub fn compensate_step<F>(
    &mut self,
    step_name: &str,
    compensate_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) -> &mut Self
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    let compensator: Compensator<TData> = Box::new(move |ctx_data| Box::pin(compensate_fn(ctx_data)));
    self.compensations.insert(step_name.to_string(), compensator);
    self
  }
}
