// server/src/models/variant.rs

use super::to_u32;
use lmi_checkout::model::{Money, StoreRef, VariantRecord, VariantRef};
use lmi_checkout::StoreError;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct VariantRow {
  pub variant_ref: String,
  pub store_ref: String,
  pub product_name: String,
  pub price: i64,
  pub stock: i64,
}

impl TryFrom<VariantRow> for VariantRecord {
  type Error = StoreError;

  fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
    Ok(VariantRecord {
      variant_ref: VariantRef::new(row.variant_ref),
      store_ref: StoreRef::new(row.store_ref),
      product_name: row.product_name,
      price: Money::new(row.price),
      stock: to_u32(row.stock, "product_variants.stock")?,
    })
  }
}
