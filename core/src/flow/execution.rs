// core/src/flow/execution.rs

//! `Flow::run`: executes steps in order and unwinds compensations on failure.

use super::context_data::ContextData;
use super::control::{FlowOutcome, StepControl};
use super::definition::Flow;
use crate::error::FlowError;
use tracing::{event, info_span, instrument, Instrument, Level};

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// - `Ok(FlowOutcome::Completed)` once all steps ran.
  /// - `Ok(FlowOutcome::Stopped)` when a handler asked to stop; nothing is undone.
  /// - `Err(e)` when a non-optional step failed; compensations for the failing step
  ///   and all completed steps have already run, newest first.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(flow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<FlowOutcome, Err> {
    let mut completed: Vec<&str> = Vec::with_capacity(self.steps.len());

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let handlers = match self.handlers.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.optional => {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step_name, "Required step has no handlers.");
          self.unwind(&completed, ctx_data.clone()).await;
          return Err(Err::from(FlowError::HandlerMissing {
            flow: self.name.clone(),
            step_name: step_def.name.clone(),
          }));
        }
      };

      let step_span = info_span!("flow_step", step_name, step_index = step_idx, optional = step_def.optional);
      for handler in handlers {
        match handler(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Stop) => {
            event!(Level::INFO, step_name, "Flow stopped by handler.");
            return Ok(FlowOutcome::Stopped);
          }
          Err(e) if step_def.optional => {
            event!(Level::WARN, step_name, error = %e, "Optional step failed, continuing.");
            break;
          }
          Err(e) => {
            event!(Level::ERROR, step_name, error = %e, "Step failed, unwinding.");
            completed.push(step_name);
            self.unwind(&completed, ctx_data.clone()).await;
            return Err(e);
          }
        }
      }
      completed.push(step_name);
    }

    event!(Level::DEBUG, "Flow completed.");
    Ok(FlowOutcome::Completed)
  }

  async fn unwind(&self, touched: &[&str], ctx_data: ContextData<TData>) {
    for step_name in touched.iter().rev() {
      if let Some(compensation) = self.compensations.get(*step_name) {
        event!(Level::WARN, flow = %self.name, step_name, "Running compensation.");
        compensation(ctx_data.clone()).await;
      }
    }
  }
}
