// core/src/cart/ledger.rs

use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{BuyerRef, Cart, CartSnapshot, VariantRecord, VariantRef};
use crate::store::{CartSessionStore, Inventory};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Server-owned cart per buyer, persisted through a `CartSessionStore`.
///
/// Every add or quantity change re-reads the variant from inventory, so the
/// stock ceiling a line is checked against is never older than the mutation.
#[derive(Clone)]
pub struct CartLedger {
  inventory: Arc<dyn Inventory>,
  sessions: Arc<dyn CartSessionStore>,
}

impl CartLedger {
  pub fn new(inventory: Arc<dyn Inventory>, sessions: Arc<dyn CartSessionStore>) -> Self {
    Self { inventory, sessions }
  }

  /// The buyer's current cart; an empty one if they never had one.
  pub async fn cart(&self, buyer: &BuyerRef) -> CheckoutResult<Cart> {
    Ok(
      self
        .sessions
        .load(buyer)
        .await?
        .unwrap_or_else(|| Cart::empty(buyer.clone())),
    )
  }

  #[instrument(name = "CartLedger::add_line", skip(self, buyer, variant), fields(buyer = %buyer, variant = %variant), err(Display))]
  pub async fn add_line(&self, buyer: &BuyerRef, variant: &VariantRef, quantity: u32) -> CheckoutResult<Cart> {
    let record = self.current_variant(variant).await?;
    let mut cart = self.cart(buyer).await?;
    let line = cart.add(&record, quantity)?;
    self.sessions.save(&cart).await?;
    event!(Level::DEBUG, line_id = %line.id, quantity = line.quantity, "Cart line added.");
    Ok(cart)
  }

  /// Sets a line's quantity. Zero or negative removes the line.
  #[instrument(name = "CartLedger::update_quantity", skip(self, buyer), fields(buyer = %buyer), err(Display))]
  pub async fn update_quantity(&self, buyer: &BuyerRef, line_id: Uuid, quantity: i64) -> CheckoutResult<Cart> {
    if quantity <= 0 {
      return self.remove_line(buyer, line_id).await;
    }
    let quantity = u32::try_from(quantity)
      .map_err(|_| CheckoutError::Validation(format!("quantity {} is too large", quantity)))?;

    let mut cart = self.cart(buyer).await?;
    let variant = cart
      .line(line_id)
      .map(|l| l.variant_ref.clone())
      .ok_or(CheckoutError::LineNotFound(line_id))?;
    let record = self.current_variant(&variant).await?;
    cart.set_quantity(line_id, quantity, record.stock)?;
    self.sessions.save(&cart).await?;
    Ok(cart)
  }

  #[instrument(name = "CartLedger::remove_line", skip(self, buyer), fields(buyer = %buyer), err(Display))]
  pub async fn remove_line(&self, buyer: &BuyerRef, line_id: Uuid) -> CheckoutResult<Cart> {
    let mut cart = self.cart(buyer).await?;
    if !cart.remove(line_id) {
      return Err(CheckoutError::LineNotFound(line_id));
    }
    self.sessions.save(&cart).await?;
    Ok(cart)
  }

  pub async fn clear(&self, buyer: &BuyerRef) -> CheckoutResult<()> {
    self.sessions.clear(buyer).await?;
    event!(Level::DEBUG, buyer = %buyer, "Cart cleared.");
    Ok(())
  }

  /// Immutable copy of the cart for order creation. Fails on an empty cart.
  pub async fn snapshot_for_checkout(&self, buyer: &BuyerRef) -> CheckoutResult<CartSnapshot> {
    let cart = self.cart(buyer).await?;
    if cart.is_empty() {
      return Err(CheckoutError::EmptyCart);
    }
    cart.snapshot()
  }

  async fn current_variant(&self, variant: &VariantRef) -> CheckoutResult<VariantRecord> {
    self
      .inventory
      .get_variant(variant)
      .await?
      .ok_or_else(|| CheckoutError::UnknownVariant(variant.clone()))
  }
}
