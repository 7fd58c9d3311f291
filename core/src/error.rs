// core/src/error.rs
use crate::model::VariantRef;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the step engine itself, independent of any domain.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step '{step_name}' in flow '{flow}'")]
  HandlerMissing { flow: String, step_name: String },

  #[error("Flow '{flow}' finished without producing {what}")]
  MissingOutput { flow: String, what: &'static str },

  #[error("Flow '{flow}' task ended abnormally: {reason}")]
  TaskFailed { flow: String, reason: String },
}

/// Everything checkout, order and payment operations can fail with.
#[derive(Debug, Error)]
pub enum CheckoutError {
  #[error("Buyer identity is required")]
  NotAuthenticated,

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("Only {available} unit(s) of variant {variant} available, {requested} requested")]
  InsufficientStock {
    variant: VariantRef,
    requested: u32,
    available: u32,
  },

  /// Stock ran out between cart and checkout (another buyer got there first).
  #[error("Variant {variant} no longer has {requested} unit(s) in stock")]
  StockConflict { variant: VariantRef, requested: u32 },

  #[error("Unknown variant: {0}")]
  UnknownVariant(VariantRef),

  #[error("Cart line not found: {0}")]
  LineNotFound(Uuid),

  #[error("Order not found: {0}")]
  OrderNotFound(Uuid),

  #[error("An identical checkout is already being processed")]
  DuplicateSubmission,

  #[error("Could not allocate a unique order number after {attempts} attempts")]
  OrderNumberExhausted { attempts: u32 },

  #[error("Payment initiation failed: {0}")]
  PaymentInitiationFailed(String),

  #[error("Order {order_id} already has a payment attempt in flight")]
  PaymentInFlight { order_id: Uuid },

  #[error("Payment for order {order_id} cannot be retried: {reason}")]
  PaymentNotRetryable { order_id: Uuid, reason: String },

  #[error("Order cannot move from '{from}' to '{to}'")]
  InvalidTransition { from: String, to: String },

  #[error("Amount overflow while pricing order")]
  AmountOverflow,

  #[error("Persistence error: {0}")]
  Persistence(#[from] StoreError),

  #[error(transparent)]
  Flow(#[from] FlowError),
}

impl CheckoutError {
  /// True for errors the buyer fixes by changing their input or cart, as
  /// opposed to infrastructure failures that only warrant a retry.
  pub fn is_caller_correctable(&self) -> bool {
    matches!(
      self,
      CheckoutError::NotAuthenticated
        | CheckoutError::EmptyCart
        | CheckoutError::Validation(_)
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::StockConflict { .. }
        | CheckoutError::UnknownVariant(_)
        | CheckoutError::LineNotFound(_)
        | CheckoutError::InvalidTransition { .. }
    )
  }
}

pub type CheckoutResult<T, E = CheckoutError> = std::result::Result<T, E>;
