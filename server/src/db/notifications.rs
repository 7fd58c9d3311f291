// server/src/db/notifications.rs

use async_trait::async_trait;
use lmi_checkout::store::OrderNotification;
use lmi_checkout::NotificationSink;
use sqlx::PgPool;
use uuid::Uuid;

/// Writes store-owner notices to the `store_notifications` outbox. Delivery
/// (push, SMS, e-mail) is someone else's job.
#[derive(Clone)]
pub struct PgNotificationSink {
  pool: PgPool,
}

impl PgNotificationSink {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
  async fn notify(&self, notification: &OrderNotification) -> anyhow::Result<()> {
    sqlx::query(
      "INSERT INTO store_notifications (id, store_ref, order_id, order_number, kind, summary) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(notification.store_ref.as_str())
    .bind(notification.order_id)
    .bind(notification.order_number.as_str())
    .bind(notification.kind.as_str())
    .bind(&notification.summary)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
