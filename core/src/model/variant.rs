// core/src/model/variant.rs

use super::ids::{StoreRef, VariantRef};
use super::money::Money;
use serde::{Deserialize, Serialize};

/// What the catalog/inventory service tells us about a variant right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
  pub variant_ref: VariantRef,
  pub store_ref: StoreRef,
  pub product_name: String,
  pub price: Money,
  pub stock: u32,
}
