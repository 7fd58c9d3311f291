// core/src/payment/mod.rs

pub mod adapter;
pub mod gateway;
pub mod msisdn;
pub mod simulated;
pub mod tracker;

pub use adapter::{InitiationKind, PaymentAdapter, PaymentInitiationResult, PaymentInstructions};
pub use gateway::{GatewayError, PaymentCallback, PaymentGateway, ProviderStatus, PushReceipt};
pub use msisdn::Msisdn;
pub use simulated::{RecordedPush, SimulatedGateway};
pub use tracker::{CallbackDisposition, PaymentStatusTracker, PaymentWatch};
