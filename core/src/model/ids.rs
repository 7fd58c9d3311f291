// core/src/model/ids.rs

//! Opaque references to things owned by other systems (buyers, stores, catalog variants).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_ref {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(String);

    impl $name {
      pub fn new(value: impl Into<String>) -> Self {
        $name(value.into())
      }

      pub fn as_str(&self) -> &str {
        &self.0
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
      }
    }

    impl From<&str> for $name {
      fn from(value: &str) -> Self {
        $name(value.to_string())
      }
    }

    impl From<String> for $name {
      fn from(value: String) -> Self {
        $name(value)
      }
    }
  };
}

opaque_ref!(
  /// Identity handed to us by the authentication layer.
  BuyerRef
);
opaque_ref!(
  /// Seller storefront that owns a product.
  StoreRef
);
opaque_ref!(
  /// Catalog product variant (size/colour combination) that carries price and stock.
  VariantRef
);
