// core/src/store/mod.rs

//! Collaborator seams: inventory, durable order storage, cart sessions and
//! store-owner notifications. Production implementations live in the server
//! crate; `memory` has in-process ones.

pub mod memory;

use crate::model::{BuyerRef, Cart, Order, OrderNumber, OrderState, PaymentAttempt, StoreRef, VariantRecord, VariantRef};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
  /// Unique constraint on the order number tripped; the caller picks a new one.
  #[error("Order number {0} is already taken")]
  DuplicateOrderNumber(OrderNumber),

  #[error("Record not found: {0}")]
  NotFound(String),

  #[error("Store backend failure. Source: {0}")]
  Backend(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  NewOrder,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      NotificationKind::NewOrder => "new_order",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderNotification {
  pub store_ref: StoreRef,
  pub order_id: Uuid,
  pub order_number: OrderNumber,
  pub kind: NotificationKind,
  pub summary: String,
}

#[async_trait]
pub trait Inventory: Send + Sync {
  async fn get_variant(&self, variant: &VariantRef) -> StoreResult<Option<VariantRecord>>;

  /// Compare-and-decrement: takes `quantity` units only if at least that many
  /// remain. Returns `false` (and changes nothing) otherwise.
  async fn try_reserve(&self, variant: &VariantRef, quantity: u32) -> StoreResult<bool>;

  /// Gives back units taken by `try_reserve`.
  async fn release(&self, variant: &VariantRef, quantity: u32) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Writes the order header and all its lines as one unit, or nothing.
  async fn insert_order(&self, order: &Order) -> StoreResult<()>;

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

  /// Replaces the order's state with `next` only if it currently equals
  /// `expected`. Returns whether the swap happened.
  async fn compare_and_set_state(&self, order_id: Uuid, expected: OrderState, next: OrderState) -> StoreResult<bool>;

  /// Inserts or overwrites the attempt by id.
  async fn save_attempt(&self, attempt: &PaymentAttempt) -> StoreResult<()>;

  async fn find_attempt_by_reference(&self, provider_reference: &str) -> StoreResult<Option<PaymentAttempt>>;

  /// Oldest first.
  async fn attempts_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentAttempt>>;
}

#[async_trait]
pub trait CartSessionStore: Send + Sync {
  async fn load(&self, buyer: &BuyerRef) -> StoreResult<Option<Cart>>;
  async fn save(&self, cart: &Cart) -> StoreResult<()>;
  async fn clear(&self, buyer: &BuyerRef) -> StoreResult<()>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn notify(&self, notification: &OrderNotification) -> anyhow::Result<()>;
}
