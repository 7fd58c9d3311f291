// core/src/orders/number.rs

use crate::model::OrderNumber;
use chrono::NaiveDate;
use rand::Rng;

/// Produces candidate order numbers. Uniqueness is enforced by the order
/// store; a source only needs to make collisions unlikely.
pub trait OrderNumberSource: Send + Sync {
  fn next_number(&self, date: NaiveDate) -> OrderNumber;
}

/// `LMI-YYYYMMDD-XXXX` with four uniformly random digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrderNumbers;

impl OrderNumberSource for RandomOrderNumbers {
  fn next_number(&self, date: NaiveDate) -> OrderNumber {
    let suffix: u16 = rand::rng().random_range(0..10_000);
    OrderNumber::compose(date, suffix)
  }
}
