// server/src/models/payment_attempt.rs

use super::row_error;
use chrono::{DateTime, Utc};
use lmi_checkout::model::PaymentAttempt;
use lmi_checkout::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentAttemptRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub method: String,
  pub provider_reference: Option<String>,
  pub status: String,
  pub failure_reason: Option<String>,
  pub created_at: DateTime<Utc>,
  pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentAttemptRow> for PaymentAttempt {
  type Error = StoreError;

  fn try_from(row: PaymentAttemptRow) -> Result<Self, Self::Error> {
    Ok(PaymentAttempt {
      id: row.id,
      order_id: row.order_id,
      method: row.method.parse().map_err(row_error)?,
      provider_reference: row.provider_reference,
      status: row.status.parse().map_err(row_error)?,
      failure_reason: row.failure_reason,
      created_at: row.created_at,
      resolved_at: row.resolved_at,
    })
  }
}
