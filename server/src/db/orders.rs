// server/src/db/orders.rs

use super::backend;
use crate::models::{OrderLineRow, OrderRow, PaymentAttemptRow};
use async_trait::async_trait;
use lmi_checkout::model::{Order, OrderState, PaymentAttempt};
use lmi_checkout::store::StoreResult;
use lmi_checkout::{OrderStore, StoreError};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

const ORDER_COLUMNS: &str = "id, order_number, buyer_ref, subtotal, shipping_fee, total, shipping_address, \
  payment_method, payment_status, order_status, estimated_delivery, created_at";

const ATTEMPT_COLUMNS: &str =
  "id, order_id, method, provider_reference, status, failure_reason, created_at, resolved_at";

#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

fn is_order_number_conflict(err: &sqlx::Error) -> bool {
  match err {
    sqlx::Error::Database(db_err) => {
      db_err.is_unique_violation() && db_err.constraint() == Some(ORDER_NUMBER_CONSTRAINT)
    }
    _ => false,
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(name = "PgOrderStore::insert_order", skip(self, order), fields(order_id = %order.id, order_number = %order.order_number), err(Display))]
  async fn insert_order(&self, order: &Order) -> StoreResult<()> {
    let mut tx = self.pool.begin().await.map_err(backend)?;

    let header = sqlx::query(
      "INSERT INTO orders (id, order_number, buyer_ref, subtotal, shipping_fee, total, shipping_address, \
       payment_method, payment_status, order_status, estimated_delivery, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(order.id)
    .bind(order.order_number.as_str())
    .bind(order.buyer.as_str())
    .bind(order.subtotal.minor_units())
    .bind(order.shipping_fee.minor_units())
    .bind(order.total.minor_units())
    .bind(Json(&order.shipping_address))
    .bind(order.payment_method.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.order_status.as_str())
    .bind(order.estimated_delivery)
    .bind(order.created_at)
    .execute(&mut *tx)
    .await;

    if let Err(e) = header {
      // Dropping `tx` rolls back.
      if is_order_number_conflict(&e) {
        debug!("Order number already taken.");
        return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
      }
      return Err(backend(e));
    }

    for (line_no, line) in order.lines.iter().enumerate() {
      sqlx::query(
        "INSERT INTO order_lines (order_id, line_no, variant_ref, store_ref, product_name, quantity, unit_price, subtotal) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
      )
      .bind(order.id)
      .bind(line_no as i32)
      .bind(line.variant_ref.as_str())
      .bind(line.store_ref.as_str())
      .bind(&line.product_name)
      .bind(i64::from(line.quantity))
      .bind(line.unit_price.minor_units())
      .bind(line.subtotal.minor_units())
      .execute(&mut *tx)
      .await
      .map_err(backend)?;
    }

    tx.commit().await.map_err(backend)?;
    Ok(())
  }

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    let header = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    let Some(header) = header else {
      return Ok(None);
    };

    let lines = sqlx::query_as::<_, OrderLineRow>(
      "SELECT order_id, line_no, variant_ref, store_ref, product_name, quantity, unit_price, subtotal \
       FROM order_lines WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(backend)?;

    header.into_order(lines).map(Some)
  }

  async fn compare_and_set_state(&self, order_id: Uuid, expected: OrderState, next: OrderState) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET order_status = $2, payment_status = $3, updated_at = now() \
       WHERE id = $1 AND order_status = $4 AND payment_status = $5",
    )
    .bind(order_id)
    .bind(next.order_status.as_str())
    .bind(next.payment_status.as_str())
    .bind(expected.order_status.as_str())
    .bind(expected.payment_status.as_str())
    .execute(&self.pool)
    .await
    .map_err(backend)?;
    Ok(result.rows_affected() == 1)
  }

  async fn save_attempt(&self, attempt: &PaymentAttempt) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO payment_attempts (id, order_id, method, provider_reference, status, failure_reason, created_at, resolved_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
       ON CONFLICT (id) DO UPDATE SET provider_reference = EXCLUDED.provider_reference, status = EXCLUDED.status, \
       failure_reason = EXCLUDED.failure_reason, resolved_at = EXCLUDED.resolved_at",
    )
    .bind(attempt.id)
    .bind(attempt.order_id)
    .bind(attempt.method.as_str())
    .bind(attempt.provider_reference.as_deref())
    .bind(attempt.status.as_str())
    .bind(attempt.failure_reason.as_deref())
    .bind(attempt.created_at)
    .bind(attempt.resolved_at)
    .execute(&self.pool)
    .await
    .map_err(|e| {
      warn!(attempt_id = %attempt.id, error = %e, "Could not save payment attempt.");
      backend(e)
    })?;
    Ok(())
  }

  async fn find_attempt_by_reference(&self, provider_reference: &str) -> StoreResult<Option<PaymentAttempt>> {
    sqlx::query_as::<_, PaymentAttemptRow>(&format!(
      "SELECT {} FROM payment_attempts WHERE provider_reference = $1",
      ATTEMPT_COLUMNS
    ))
    .bind(provider_reference)
    .fetch_optional(&self.pool)
    .await
    .map_err(backend)?
    .map(PaymentAttempt::try_from)
    .transpose()
  }

  async fn attempts_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentAttempt>> {
    sqlx::query_as::<_, PaymentAttemptRow>(&format!(
      "SELECT {} FROM payment_attempts WHERE order_id = $1 ORDER BY created_at, id",
      ATTEMPT_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(backend)?
    .into_iter()
    .map(PaymentAttempt::try_from)
    .collect()
  }
}
