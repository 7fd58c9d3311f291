// core/src/flow/mod.rs

//! A small step engine: named async steps over shared context data, with
//! compensations that undo completed steps when a later one fails.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;
pub mod step;

pub use context_data::ContextData;
pub use control::{FlowOutcome, StepControl};
pub use definition::Flow;
pub use step::{Compensation, Handler, StepDef};
