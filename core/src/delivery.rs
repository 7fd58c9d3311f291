// core/src/delivery.rs

//! Shipping fee and delivery estimate per destination city.

use crate::model::Money;
use chrono::{Days, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EtaWindow {
  pub min_days: u32,
  pub max_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryQuote {
  /// The city as the buyer typed it, trimmed.
  pub city: String,
  pub fee: Money,
  pub eta: EtaWindow,
  pub eta_description: String,
  /// `false` when the city is not in the table and the fallback was used.
  pub known_destination: bool,
}

impl DeliveryQuote {
  /// Order date plus the upper end of the window.
  pub fn estimated_delivery(&self, ordered_on: NaiveDate) -> NaiveDate {
    ordered_on
      .checked_add_days(Days::new(u64::from(self.eta.max_days)))
      .unwrap_or(NaiveDate::MAX)
  }
}

struct Destination {
  key: &'static str,
  fee: i64,
  min_days: u32,
  max_days: u32,
}

const DESTINATIONS: &[Destination] = &[
  Destination { key: "maputo", fee: 150, min_days: 1, max_days: 2 },
  Destination { key: "matola", fee: 200, min_days: 1, max_days: 2 },
  Destination { key: "xai-xai", fee: 250, min_days: 2, max_days: 3 },
  Destination { key: "inhambane", fee: 300, min_days: 2, max_days: 4 },
  Destination { key: "beira", fee: 350, min_days: 3, max_days: 5 },
  Destination { key: "chimoio", fee: 350, min_days: 3, max_days: 5 },
  Destination { key: "quelimane", fee: 400, min_days: 3, max_days: 5 },
  Destination { key: "tete", fee: 400, min_days: 4, max_days: 6 },
  Destination { key: "nampula", fee: 450, min_days: 4, max_days: 6 },
  Destination { key: "pemba", fee: 500, min_days: 5, max_days: 7 },
  Destination { key: "lichinga", fee: 500, min_days: 5, max_days: 7 },
];

const FALLBACK: Destination = Destination { key: "", fee: 600, min_days: 5, max_days: 10 };

/// Pure lookup over a fixed table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryCalculator;

impl DeliveryCalculator {
  pub fn new() -> Self {
    DeliveryCalculator
  }

  pub fn quote(&self, city: &str) -> DeliveryQuote {
    let trimmed = city.trim();
    let key = trimmed.to_lowercase();
    let (dest, known) = match DESTINATIONS.iter().find(|d| d.key == key) {
      Some(dest) => (dest, true),
      None => (&FALLBACK, false),
    };

    DeliveryQuote {
      city: trimmed.to_string(),
      fee: Money::new(dest.fee),
      eta: EtaWindow { min_days: dest.min_days, max_days: dest.max_days },
      eta_description: format!("{}-{} business days", dest.min_days, dest.max_days),
      known_destination: known,
    }
  }
}
