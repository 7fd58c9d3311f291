// core/src/flow/definition.rs

//! The `Flow<TData, Err>` struct: an ordered list of named steps, their handlers,
//! and the compensations that undo them.

use super::context_data::ContextData;
use super::control::StepControl;
use super::step::{Compensation, Handler, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;
use std::future::Future;

/// A named, ordered sequence of async steps over a shared `ContextData<TData>`.
///
/// Handlers return `Result<StepControl, Err>`. When a non-optional step fails, the
/// compensation of the failing step and of every completed step runs in reverse order
/// before the error is returned, so the flow either finishes or leaves nothing behind.
///
/// `Err` must be constructible from `FlowError` so that setup mistakes detected at run
/// time (a required step with no handler) surface through the caller's own error type.
pub struct Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef>,
  pub(crate) handlers: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) compensations: HashMap<String, Compensation<TData>>,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a flow from `(step_name, optional)` pairs, in execution order.
  pub fn new(name: impl Into<String>, step_defs: &[(&str, bool)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
      })
      .collect();

    Self {
      name: name.into(),
      steps,
      handlers: HashMap::new(),
      compensations: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// Panics on an unknown step name. Flows are wired once at construction, so a
  /// typo here is a programming error, not a runtime condition.
  fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!("Flow '{}' setup error: step '{}' is not defined.", self.name, step_name);
    }
  }

  /// Registers a handler for `step_name`. Several handlers on one step run in
  /// registration order.
  pub fn on_step<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let fut = handler_fn(ctx_data);
      Box::pin(async move { fut.await.map_err(Into::into) })
    });
    self.handlers.entry(step_name.to_string()).or_default().push(handler);
  }

  /// Sets the compensation for `step_name`, replacing any previous one.
  ///
  /// The compensation must tolerate partial work: it also runs when its own step
  /// fails half-way through.
  pub fn compensate<F>(
    &mut self,
    step_name: &str,
    compensation_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = ()> + Send + 'static,
  {
    self.ensure_step_exists(step_name);
    let compensation: Compensation<TData> = Box::new(move |ctx_data| Box::pin(compensation_fn(ctx_data)));
    self.compensations.insert(step_name.to_string(), compensation);
  }
}
