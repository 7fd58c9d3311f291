// server/src/db/inventory.rs

use super::backend;
use crate::models::VariantRow;
use async_trait::async_trait;
use lmi_checkout::model::{VariantRecord, VariantRef};
use lmi_checkout::store::StoreResult;
use lmi_checkout::{Inventory, StoreError};
use sqlx::PgPool;
use tracing::debug;

#[derive(Clone)]
pub struct PgInventory {
  pool: PgPool,
}

impl PgInventory {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn exists(&self, variant: &VariantRef) -> StoreResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM product_variants WHERE variant_ref = $1)")
      .bind(variant.as_str())
      .fetch_one(&self.pool)
      .await
      .map_err(backend)
  }
}

#[async_trait]
impl Inventory for PgInventory {
  async fn get_variant(&self, variant: &VariantRef) -> StoreResult<Option<VariantRecord>> {
    sqlx::query_as::<_, VariantRow>(
      "SELECT variant_ref, store_ref, product_name, price, stock FROM product_variants WHERE variant_ref = $1",
    )
    .bind(variant.as_str())
    .fetch_optional(&self.pool)
    .await
    .map_err(backend)?
    .map(VariantRecord::try_from)
    .transpose()
  }

  async fn try_reserve(&self, variant: &VariantRef, quantity: u32) -> StoreResult<bool> {
    // The row lock taken by UPDATE makes the check and the decrement one step.
    let result = sqlx::query("UPDATE product_variants SET stock = stock - $2 WHERE variant_ref = $1 AND stock >= $2")
      .bind(variant.as_str())
      .bind(i64::from(quantity))
      .execute(&self.pool)
      .await
      .map_err(backend)?;
    if result.rows_affected() == 1 {
      return Ok(true);
    }
    if !self.exists(variant).await? {
      return Err(StoreError::NotFound(format!("variant {}", variant)));
    }
    debug!(variant = %variant, quantity, "Not enough stock to reserve.");
    Ok(false)
  }

  async fn release(&self, variant: &VariantRef, quantity: u32) -> StoreResult<()> {
    let result = sqlx::query("UPDATE product_variants SET stock = stock + $2 WHERE variant_ref = $1")
      .bind(variant.as_str())
      .bind(i64::from(quantity))
      .execute(&self.pool)
      .await
      .map_err(backend)?;
    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("variant {}", variant)));
    }
    Ok(())
  }
}
