// core/src/flow/step.rs

//! Step definitions and the boxed handler types stored by a `Flow`.

use super::context_data::ContextData;
use super::control::StepControl;
use std::future::Future;
use std::pin::Pin;

/// A step handler: takes a clone of the flow's context and resolves to a control signal.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync,
>;

/// Undo action for a step. Runs when that step, or any later one, fails.
///
/// Compensations cannot fail the flow further; they log their own problems.
pub type Compensation<TData> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Name and optionality of one step.
///
/// An optional step may have no handler, and a failure inside it is logged and
/// swallowed instead of failing the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDef {
  pub name: String,
  pub optional: bool,
}
