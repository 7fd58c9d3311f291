// core/src/orders/mod.rs

pub mod idempotency;
pub mod number;
pub mod orchestrator;
pub mod status;

pub use idempotency::{Claim, SubmissionGuard, SubmissionKey};
pub use number::{OrderNumberSource, RandomOrderNumbers};
pub use orchestrator::{OrderOrchestrator, OrderPlacement, OrderRequest};
pub use status::{OrderStatusMachine, TransitionOutcome};
