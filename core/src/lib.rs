// src/lib.rs

//! LMI checkout: order and payment orchestration for a multi-store marketplace.
//!
//! The crate covers the path from a buyer's cart to a paid (or retryable) order:
//!  - A server-owned cart per buyer, validated against live stock on every change.
//!  - Delivery fee and estimate lookup per destination city.
//!  - Order creation as a step flow with compensations: validation, submission
//!    dedupe, stock reservation, pricing, atomic persistence, store-owner notices.
//!  - Payment initiation for mobile money push, bank transfer and cash on delivery.
//!  - A background tracker per pending payment that polls the provider, accepts
//!    callbacks and moves the order forward exactly once.
//!
//! Storage, inventory, notifications and the payment provider are traits in
//! [`store`] and [`payment`]; in-memory implementations ship with the crate.

pub mod cart;
pub mod config;
pub mod delivery;
pub mod error;
pub mod flow;
pub mod model;
pub mod orders;
pub mod payment;
pub mod service;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::cart::CartLedger;
pub use crate::config::{BankTransferDetails, CheckoutConfig};
pub use crate::delivery::{DeliveryCalculator, DeliveryQuote, EtaWindow};
pub use crate::error::{CheckoutError, CheckoutResult, FlowError};
pub use crate::flow::{ContextData, Flow, FlowOutcome, StepControl};
pub use crate::orders::{OrderOrchestrator, OrderPlacement, OrderRequest, OrderStatusMachine, TransitionOutcome};
pub use crate::payment::{
  CallbackDisposition, PaymentAdapter, PaymentCallback, PaymentGateway, PaymentStatusTracker, PaymentWatch,
};
pub use crate::service::{
  CancelActor, CheckoutReceipt, CheckoutRequest, CheckoutService, Collaborators, OrderView, PaymentStep,
};
pub use crate::store::{CartSessionStore, Inventory, NotificationSink, OrderStore, StoreError};
