// server/src/models/mod.rs

//! Row shapes of the checkout tables and their conversion into core types.

pub mod order;
pub mod payment_attempt;
pub mod variant;

pub use order::{OrderLineRow, OrderRow};
pub use payment_attempt::PaymentAttemptRow;
pub use variant::VariantRow;

use lmi_checkout::StoreError;

/// A stored value the core types refuse (unknown status string, malformed number...).
fn row_error(err: impl std::fmt::Display) -> StoreError {
  StoreError::Backend(anyhow::anyhow!("Malformed row: {}", err))
}

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
  u32::try_from(value).map_err(|_| row_error(format!("{} out of range: {}", column, value)))
}
