// core/src/model/order.rs

//! Orders, their lines and the two status axes they move along.

use super::ids::{BuyerRef, StoreRef, VariantRef};
use super::money::Money;
use super::payment::PaymentMethod;
use crate::error::{CheckoutError, CheckoutResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of every human-readable order number.
pub const ORDER_NUMBER_PREFIX: &str = "LMI";

/// Fulfilment lifecycle. A strict DAG:
/// `pending -> confirmed -> shipped -> delivered`, plus `cancelled` from
/// `pending` or `confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Shipped) | (Confirmed, Cancelled) | (Shipped, Delivered)
    )
  }

  pub fn is_cancellable(self) -> bool {
    self.can_transition_to(OrderStatus::Cancelled)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = CheckoutError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(OrderStatus::Pending),
      "confirmed" => Ok(OrderStatus::Confirmed),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(CheckoutError::Validation(format!("unknown order status '{}'", other))),
    }
  }
}

/// Payment axis of an order. `paid` is terminal; `payment_failed` reopens to
/// `awaiting_payment` only when the buyer starts a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  AwaitingPayment,
  Paid,
  PaymentFailed,
}

impl PaymentStatus {
  pub fn can_transition_to(self, next: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
      (self, next),
      (AwaitingPayment, Paid) | (AwaitingPayment, PaymentFailed) | (PaymentFailed, AwaitingPayment)
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::AwaitingPayment => "awaiting_payment",
      PaymentStatus::Paid => "paid",
      PaymentStatus::PaymentFailed => "payment_failed",
    }
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = CheckoutError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "awaiting_payment" => Ok(PaymentStatus::AwaitingPayment),
      "paid" => Ok(PaymentStatus::Paid),
      "payment_failed" => Ok(PaymentStatus::PaymentFailed),
      other => Err(CheckoutError::Validation(format!("unknown payment status '{}'", other))),
    }
  }
}

/// Both status axes together; the unit compared-and-set by the order store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
  pub order_status: OrderStatus,
  pub payment_status: PaymentStatus,
}

impl OrderState {
  pub const fn initial() -> Self {
    OrderState {
      order_status: OrderStatus::Pending,
      payment_status: PaymentStatus::AwaitingPayment,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub recipient_name: String,
  pub phone: String,
  pub street: String,
  pub city: String,
  pub district: Option<String>,
  pub reference: Option<String>,
}

impl ShippingAddress {
  pub fn validate(&self) -> CheckoutResult<()> {
    if self.city.trim().is_empty() {
      return Err(CheckoutError::Validation("shipping address city is required".to_string()));
    }
    if self.street.trim().is_empty() {
      return Err(CheckoutError::Validation("shipping address street is required".to_string()));
    }
    Ok(())
  }
}

/// Immutable line of a placed order. Prices and names are snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
  pub order_id: Uuid,
  pub variant_ref: VariantRef,
  pub store_ref: StoreRef,
  pub product_name: String,
  pub quantity: u32,
  pub unit_price: Money,
  pub subtotal: Money,
}

/// Human-readable unique order number, `LMI-YYYYMMDD-XXXX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
  /// Builds the number for `date` with a 4-digit suffix (`suffix` is taken modulo 10000).
  pub fn compose(date: NaiveDate, suffix: u16) -> Self {
    OrderNumber(format!(
      "{}-{}-{:04}",
      ORDER_NUMBER_PREFIX,
      date.format("%Y%m%d"),
      suffix % 10_000
    ))
  }

  /// Accepts only well-formed numbers.
  pub fn parse(raw: &str) -> CheckoutResult<Self> {
    let invalid = || CheckoutError::Validation(format!("'{}' is not a valid order number", raw));
    let mut parts = raw.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
      return Err(invalid());
    };
    if prefix != ORDER_NUMBER_PREFIX
      || suffix.len() != 4
      || !suffix.bytes().all(|b| b.is_ascii_digit())
      || NaiveDate::parse_from_str(date, "%Y%m%d").is_err()
      || date.len() != 8
    {
      return Err(invalid());
    }
    Ok(OrderNumber(raw.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for OrderNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A placed order. Append-only: after creation only the two status fields
/// change, and only through the order store's compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub order_number: OrderNumber,
  pub buyer: BuyerRef,
  pub lines: Vec<OrderLine>,
  pub subtotal: Money,
  pub shipping_fee: Money,
  pub total: Money,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub estimated_delivery: NaiveDate,
}

impl Order {
  pub fn state(&self) -> OrderState {
    OrderState {
      order_status: self.order_status,
      payment_status: self.payment_status,
    }
  }

  pub fn apply_state(&mut self, state: OrderState) {
    self.order_status = state.order_status;
    self.payment_status = state.payment_status;
  }

  /// Distinct stores contributing lines, in first-seen order.
  pub fn stores(&self) -> Vec<StoreRef> {
    let mut stores: Vec<StoreRef> = Vec::new();
    for line in &self.lines {
      if !stores.contains(&line.store_ref) {
        stores.push(line.store_ref.clone());
      }
    }
    stores
  }

  /// Checks `total == subtotal + shipping_fee` and that the subtotal matches the lines.
  pub fn totals_consistent(&self) -> bool {
    let lines_ok = self
      .lines
      .iter()
      .all(|l| l.unit_price.checked_times(l.quantity) == Some(l.subtotal));
    let sum = Money::checked_sum(self.lines.iter().map(|l| l.subtotal));
    lines_ok && sum == Some(self.subtotal) && self.subtotal.checked_add(self.shipping_fee) == Some(self.total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn order_status_only_moves_forward() {
    use OrderStatus::*;
    assert!(Pending.can_transition_to(Confirmed));
    assert!(Confirmed.can_transition_to(Shipped));
    assert!(Shipped.can_transition_to(Delivered));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Confirmed.can_transition_to(Cancelled));

    assert!(!Confirmed.can_transition_to(Pending));
    assert!(!Shipped.can_transition_to(Cancelled));
    assert!(!Delivered.can_transition_to(Shipped));
    assert!(!Cancelled.can_transition_to(Confirmed));
    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Pending.can_transition_to(Pending));
  }

  #[test]
  fn paid_is_terminal() {
    use PaymentStatus::*;
    assert!(!Paid.can_transition_to(AwaitingPayment));
    assert!(!Paid.can_transition_to(PaymentFailed));
    assert!(PaymentFailed.can_transition_to(AwaitingPayment));
    assert!(!PaymentFailed.can_transition_to(Paid));
  }

  #[test]
  fn order_number_format() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    let number = OrderNumber::compose(date, 42);
    assert_eq!(number.as_str(), "LMI-20240309-0042");
    assert_eq!(OrderNumber::parse("LMI-20240309-0042").unwrap(), number);
    assert!(OrderNumber::parse("LMI-20240309-42").is_err());
    assert!(OrderNumber::parse("ABC-20240309-0042").is_err());
    assert!(OrderNumber::parse("LMI-20241309-0042").is_err());
  }

  #[test]
  fn address_requires_city_and_street() {
    let mut address = ShippingAddress {
      recipient_name: "Ana".into(),
      phone: "841234567".into(),
      street: "Av. Julius Nyerere 100".into(),
      city: "Maputo".into(),
      ..Default::default()
    };
    assert!(address.validate().is_ok());
    address.city = "   ".into();
    assert!(matches!(address.validate(), Err(CheckoutError::Validation(_))));
    address.city = "Maputo".into();
    address.street.clear();
    assert!(matches!(address.validate(), Err(CheckoutError::Validation(_))));
  }
}
