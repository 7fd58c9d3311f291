// core/src/model/cart.rs

//! The buyer's cart and the frozen snapshot handed to order creation.

use super::ids::{BuyerRef, StoreRef, VariantRef};
use super::money::Money;
use super::variant::VariantRecord;
use crate::error::{CheckoutError, CheckoutResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
  pub id: Uuid,
  pub variant_ref: VariantRef,
  pub store_ref: StoreRef,
  pub product_name: String,
  /// Price when the line was first added. Later catalog changes do not touch it.
  pub unit_price: Money,
  pub quantity: u32,
  /// Stock observed at the last add/update. Re-read on every mutation.
  pub stock_ceiling: u32,
}

impl CartLine {
  pub fn subtotal(&self) -> Option<Money> {
    self.unit_price.checked_times(self.quantity)
  }
}

/// A buyer's cart. Invariant: every line has `0 < quantity <= stock_ceiling`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
  pub buyer: BuyerRef,
  pub lines: Vec<CartLine>,
  pub updated_at: DateTime<Utc>,
}

impl Cart {
  pub fn empty(buyer: BuyerRef) -> Self {
    Self {
      buyer,
      lines: Vec::new(),
      updated_at: Utc::now(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn line(&self, line_id: Uuid) -> Option<&CartLine> {
    self.lines.iter().find(|l| l.id == line_id)
  }

  /// Adds `quantity` of the variant, merging into an existing line for it.
  ///
  /// Rejects (never clamps) when the merged quantity exceeds `record.stock`.
  pub fn add(&mut self, record: &VariantRecord, quantity: u32) -> CheckoutResult<CartLine> {
    if quantity == 0 {
      return Err(CheckoutError::Validation("quantity must be at least 1".to_string()));
    }

    let existing_idx = self.lines.iter().position(|l| l.variant_ref == record.variant_ref);
    let current = existing_idx.map_or(0, |idx| self.lines[idx].quantity);
    let requested = current.checked_add(quantity).ok_or_else(|| {
      CheckoutError::Validation(format!("quantity for variant {} is too large", record.variant_ref))
    })?;
    if requested > record.stock {
      return Err(CheckoutError::InsufficientStock {
        variant: record.variant_ref.clone(),
        requested,
        available: record.stock,
      });
    }

    let line = match existing_idx {
      Some(idx) => {
        let line = &mut self.lines[idx];
        line.quantity = requested;
        line.stock_ceiling = record.stock;
        line.clone()
      }
      None => {
        let line = CartLine {
          id: Uuid::new_v4(),
          variant_ref: record.variant_ref.clone(),
          store_ref: record.store_ref.clone(),
          product_name: record.product_name.clone(),
          unit_price: record.price,
          quantity: requested,
          stock_ceiling: record.stock,
        };
        self.lines.push(line.clone());
        line
      }
    };
    self.updated_at = Utc::now();
    Ok(line)
  }

  /// Sets an absolute quantity on an existing line, validated against `current_stock`.
  pub fn set_quantity(&mut self, line_id: Uuid, quantity: u32, current_stock: u32) -> CheckoutResult<CartLine> {
    let line = self
      .lines
      .iter_mut()
      .find(|l| l.id == line_id)
      .ok_or(CheckoutError::LineNotFound(line_id))?;
    if quantity > current_stock {
      return Err(CheckoutError::InsufficientStock {
        variant: line.variant_ref.clone(),
        requested: quantity,
        available: current_stock,
      });
    }
    line.quantity = quantity;
    line.stock_ceiling = current_stock;
    let updated = line.clone();
    self.updated_at = Utc::now();
    Ok(updated)
  }

  /// Returns whether a line was removed.
  pub fn remove(&mut self, line_id: Uuid) -> bool {
    let before = self.lines.len();
    self.lines.retain(|l| l.id != line_id);
    let removed = self.lines.len() != before;
    if removed {
      self.updated_at = Utc::now();
    }
    removed
  }

  pub fn subtotal(&self) -> CheckoutResult<Money> {
    let line_totals = self
      .lines
      .iter()
      .map(|l| l.subtotal().ok_or(CheckoutError::AmountOverflow))
      .collect::<CheckoutResult<Vec<_>>>()?;
    Money::checked_sum(line_totals).ok_or(CheckoutError::AmountOverflow)
  }

  /// Freezes the cart for checkout.
  pub fn snapshot(&self) -> CheckoutResult<CartSnapshot> {
    Ok(CartSnapshot {
      buyer: self.buyer.clone(),
      lines: Arc::from(self.lines.clone()),
      subtotal: self.subtotal()?,
      cart_hash: content_hash(&self.buyer, &self.lines),
      taken_at: Utc::now(),
    })
  }
}

/// Immutable copy of a cart, the only cart shape order creation accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
  pub buyer: BuyerRef,
  pub lines: Arc<[CartLine]>,
  pub subtotal: Money,
  /// Hex SHA-256 of buyer + (variant, quantity, unit price) for every line, order-independent.
  pub cart_hash: String,
  pub taken_at: DateTime<Utc>,
}

impl CartSnapshot {
  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }
}

fn content_hash(buyer: &BuyerRef, lines: &[CartLine]) -> String {
  let mut entries: Vec<(&str, u32, i64)> = lines
    .iter()
    .map(|l| (l.variant_ref.as_str(), l.quantity, l.unit_price.minor_units()))
    .collect();
  entries.sort_unstable();

  let mut hasher = Sha256::new();
  hasher.update(buyer.as_str().as_bytes());
  for (variant, quantity, price) in entries {
    hasher.update(b"\n");
    hasher.update(variant.as_bytes());
    hasher.update(b"|");
    hasher.update(quantity.to_be_bytes());
    hasher.update(b"|");
    hasher.update(price.to_be_bytes());
  }
  hex::encode(hasher.finalize())
}
