// server/src/models/order.rs

use super::{row_error, to_u32};
use chrono::{DateTime, NaiveDate, Utc};
use lmi_checkout::model::{
  BuyerRef, Money, Order, OrderLine, OrderNumber, ShippingAddress, StoreRef, VariantRef,
};
use lmi_checkout::StoreError;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub order_number: String,
  pub buyer_ref: String,
  pub subtotal: i64,
  pub shipping_fee: i64,
  pub total: i64,
  pub shipping_address: Json<ShippingAddress>,
  pub payment_method: String,
  pub payment_status: String,
  pub order_status: String,
  pub estimated_delivery: NaiveDate,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderLineRow {
  pub order_id: Uuid,
  pub line_no: i32,
  pub variant_ref: String,
  pub store_ref: String,
  pub product_name: String,
  pub quantity: i64,
  pub unit_price: i64,
  pub subtotal: i64,
}

impl OrderLineRow {
  pub fn into_line(self) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
      order_id: self.order_id,
      variant_ref: VariantRef::new(self.variant_ref),
      store_ref: StoreRef::new(self.store_ref),
      product_name: self.product_name,
      quantity: to_u32(self.quantity, "order_lines.quantity")?,
      unit_price: Money::new(self.unit_price),
      subtotal: Money::new(self.subtotal),
    })
  }
}

impl OrderRow {
  /// Lines must already be in `line_no` order.
  pub fn into_order(self, lines: Vec<OrderLineRow>) -> Result<Order, StoreError> {
    let lines = lines
      .into_iter()
      .map(OrderLineRow::into_line)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Order {
      id: self.id,
      order_number: OrderNumber::parse(&self.order_number).map_err(row_error)?,
      buyer: BuyerRef::new(self.buyer_ref),
      lines,
      subtotal: Money::new(self.subtotal),
      shipping_fee: Money::new(self.shipping_fee),
      total: Money::new(self.total),
      shipping_address: self.shipping_address.0,
      payment_method: self.payment_method.parse().map_err(row_error)?,
      payment_status: self.payment_status.parse().map_err(row_error)?,
      order_status: self.order_status.parse().map_err(row_error)?,
      created_at: self.created_at,
      estimated_delivery: self.estimated_delivery,
    })
  }
}
