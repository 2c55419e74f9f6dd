// orderflow/src/workflow/execution.rs

//! `Pipeline::run()`: executes steps in order and compensates on failure.

use super::context_data::ContextData;
use super::control::{StepControl, WorkflowOutcome};
use super::definition::Pipeline;
use super::error::WorkflowError;
use tracing::{event, instrument, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// On a handler error the compensations of all completed steps run in
  /// reverse order, then the handler's error is returned unchanged.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(pipeline = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<WorkflowOutcome, Err> {
    let mut completed: Vec<&str> = Vec::with_capacity(self.steps.len());

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = tracing::info_span!("pipeline_step", step_name, step_index = step_idx);

      let handlers = match self.on.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.optional => {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step_name, "Non-optional step has no handlers.");
          self.compensate(&completed, &ctx_data).await;
          return Err(Err::from(WorkflowError::HandlerMissing {
            step_name: step_def.name.clone(),
          }));
        }
      };

      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Stop) => {
            event!(Level::INFO, step_name, "Pipeline stopped by handler.");
            return Ok(WorkflowOutcome::Stopped);
          }
          Err(e) => {
            event!(Level::WARN, step_name, error = %e, "Step failed; compensating completed steps.");
            self.compensate(&completed, &ctx_data).await;
            return Err(e);
          }
        }
      }
      completed.push(step_name);
    }

    event!(Level::DEBUG, "Pipeline completed.");
    Ok(WorkflowOutcome::Completed)
  }

  async fn compensate(&self, completed: &[&str], ctx_data: &ContextData<TData>) {
    for step_name in completed.iter().rev() {
      if let Some(compensator) = self.compensations.get(*step_name) {
        event!(Level::INFO, step_name = *step_name, "Compensating step.");
        compensator(ctx_data.clone()).await;
      }
    }
  }
}
