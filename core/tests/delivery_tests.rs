// tests/delivery_tests.rs

use chrono::NaiveDate;
use lmi_checkout::model::Money;
use lmi_checkout::DeliveryCalculator;

#[test]
fn test_fee_table() {
  let calc = DeliveryCalculator::new();
  let table: &[(&str, i64, u32, u32)] = &[
    ("Maputo", 150, 1, 2),
    ("Matola", 200, 1, 2),
    ("Xai-Xai", 250, 2, 3),
    ("Inhambane", 300, 2, 4),
    ("Beira", 350, 3, 5),
    ("Chimoio", 350, 3, 5),
    ("Quelimane", 400, 3, 5),
    ("Tete", 400, 4, 6),
    ("Nampula", 450, 4, 6),
    ("Pemba", 500, 5, 7),
    ("Lichinga", 500, 5, 7),
  ];

  for (city, fee, min_days, max_days) in table {
    let quote = calc.quote(city);
    assert!(quote.known_destination, "{} should be known", city);
    assert_eq!(quote.fee, Money::new(*fee), "fee for {}", city);
    assert_eq!((quote.eta.min_days, quote.eta.max_days), (*min_days, *max_days), "eta for {}", city);
  }
}

#[test]
fn test_lookup_ignores_case_and_whitespace() {
  let calc = DeliveryCalculator::new();
  let quote = calc.quote("  mAPUTO \t");
  assert!(quote.known_destination);
  assert_eq!(quote.fee, Money::new(150));
  assert_eq!(quote.city, "mAPUTO");
  let (lower, upper) = (calc.quote("xai-xai"), calc.quote("XAI-XAI"));
  assert_eq!((lower.fee, lower.eta), (upper.fee, upper.eta));
}

#[test]
fn test_unknown_destination_uses_flagged_fallback() {
  let calc = DeliveryCalculator::new();
  for city in ["Vilankulo", "", "   "] {
    let quote = calc.quote(city);
    assert!(!quote.known_destination);
    assert_eq!(quote.fee, Money::new(600));
    assert_eq!((quote.eta.min_days, quote.eta.max_days), (5, 10));
  }
}

#[test]
fn test_estimated_delivery_adds_upper_bound() {
  let calc = DeliveryCalculator::new();
  let ordered = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
  assert_eq!(
    calc.quote("Beira").estimated_delivery(ordered),
    NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()
  );
  assert_eq!(
    calc.quote("Somewhere").estimated_delivery(ordered),
    NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
  );
}
