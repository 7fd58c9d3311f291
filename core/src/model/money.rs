// core/src/model/money.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO code of the currency every amount in an order is expressed in.
pub const CURRENCY_CODE: &str = "MZN";

/// An amount in the smallest reported unit of the local currency.
///
/// Integer only; arithmetic is checked so a pathological cart surfaces as an
/// error instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn new(minor_units: i64) -> Self {
    Money(minor_units)
  }

  pub const fn minor_units(self) -> i64 {
    self.0
  }

  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  pub fn checked_add(self, other: Money) -> Option<Money> {
    self.0.checked_add(other.0).map(Money)
  }

  /// Unit price times quantity.
  pub fn checked_times(self, quantity: u32) -> Option<Money> {
    self.0.checked_mul(i64::from(quantity)).map(Money)
  }

  /// Sums an iterator of amounts, `None` on overflow.
  pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
    amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.0, CURRENCY_CODE)
  }
}

impl From<i64> for Money {
  fn from(minor_units: i64) -> Self {
    Money(minor_units)
  }
}
