// core/src/payment/msisdn.rs

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Serialize, Serializer};
use std::fmt;

const COUNTRY_CODE: &str = "258";

/// A Mozambican mobile number: `8[2-7]` followed by seven digits, with an
/// optional `+258`/`258` country prefix. Spaces and dashes are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Msisdn {
  national: String,
}

impl Msisdn {
  pub fn parse(raw: &str) -> CheckoutResult<Self> {
    let compact: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let without_plus = compact.strip_prefix('+').unwrap_or(&compact);
    let national = match without_plus.strip_prefix(COUNTRY_CODE) {
      Some(rest) if rest.len() == 9 => rest,
      _ if !compact.starts_with('+') => without_plus,
      _ => return Err(invalid(raw)),
    };

    let bytes = national.as_bytes();
    let well_formed = bytes.len() == 9
      && bytes.iter().all(u8::is_ascii_digit)
      && bytes[0] == b'8'
      && (b'2'..=b'7').contains(&bytes[1]);
    if !well_formed {
      return Err(invalid(raw));
    }
    Ok(Msisdn {
      national: national.to_string(),
    })
  }

  /// Nine digits, no country code.
  pub fn national(&self) -> &str {
    &self.national
  }

  /// Country code plus national number, no `+`. The form providers expect.
  pub fn international(&self) -> String {
    format!("{}{}", COUNTRY_CODE, self.national)
  }
}

fn invalid(raw: &str) -> CheckoutError {
  CheckoutError::Validation(format!("'{}' is not a valid mobile money number", raw.trim()))
}

impl fmt::Display for Msisdn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "+{}{}", COUNTRY_CODE, self.national)
  }
}

impl Serialize for Msisdn {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.international())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_local_and_prefixed_forms() {
    for raw in ["841234567", "+258841234567", "258841234567", "84 123 4567", "+258 87-123-4567"] {
      let msisdn = Msisdn::parse(raw).unwrap_or_else(|e| panic!("{} rejected: {}", raw, e));
      assert_eq!(msisdn.national().len(), 9);
    }
    assert_eq!(Msisdn::parse("+258841234567").unwrap().international(), "258841234567");
  }

  #[test]
  fn rejects_non_mobile_numbers() {
    for raw in ["", "21123456", "811234567", "881234567", "84123456", "8412345678", "+351841234567", "84abc4567"] {
      assert!(Msisdn::parse(raw).is_err(), "{} should be rejected", raw);
    }
  }
}
