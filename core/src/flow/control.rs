// core/src/flow/control.rs

//! Signals a step handler returns, and the outcome of a whole flow run.

/// Returned by a step handler to say whether the flow goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining handlers of this step, then the next step.
  Continue,
  /// Halt the flow here. Already-completed steps are kept; no compensation runs.
  Stop,
}

/// Outcome of a successful `Flow::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
  /// Every step ran.
  Completed,
  /// A handler returned `StepControl::Stop`.
  Stopped,
}
