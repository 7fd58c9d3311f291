// core/src/orders/idempotency.rs

//! Dedupe of checkout submissions.
//!
//! A submission is keyed either by the caller's explicit idempotency key or,
//! without one, by the content hash of the cart snapshot. A key is claimed for
//! the duration of order creation; once the order exists the key remembers it
//! for `window`, so a double-tap or client retry gets the same order back.
//! A claim whose holder never finished is dropped after `STALE_CLAIM_AFTER`.

use crate::error::{CheckoutError, CheckoutResult};
use crate::model::BuyerRef;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Longest an order creation may hold its claim before others can take it.
pub const STALE_CLAIM_AFTER: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey(String);

impl SubmissionKey {
  pub fn explicit(buyer: &BuyerRef, key: &str) -> Self {
    SubmissionKey(format!("key:{}:{}", buyer, key))
  }

  pub fn for_cart(buyer: &BuyerRef, cart_hash: &str) -> Self {
    SubmissionKey(format!("cart:{}:{}", buyer, cart_hash))
  }

  /// Explicit key when given and non-blank, cart hash otherwise.
  pub fn derive(buyer: &BuyerRef, idempotency_key: Option<&str>, cart_hash: &str) -> Self {
    match idempotency_key.map(str::trim).filter(|k| !k.is_empty()) {
      Some(key) => Self::explicit(buyer, key),
      None => Self::for_cart(buyer, cart_hash),
    }
  }
}

impl fmt::Display for SubmissionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
  /// Nobody holds the key; the caller now does and must `complete` or `release` it.
  Fresh,
  /// An order was already created under this key inside the window.
  Completed(Uuid),
}

#[derive(Debug, Clone, Copy)]
enum Entry {
  InFlight { since: Instant },
  Completed { order_id: Uuid, at: Instant },
}

#[derive(Debug)]
pub struct SubmissionGuard {
  window: Duration,
  entries: Mutex<HashMap<SubmissionKey, Entry>>,
}

impl SubmissionGuard {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      entries: Mutex::new(HashMap::new()),
    }
  }

  pub fn claim(&self, key: &SubmissionKey) -> CheckoutResult<Claim> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    entries.retain(|_, entry| match entry {
      Entry::InFlight { since } => now.duration_since(*since) < STALE_CLAIM_AFTER,
      Entry::Completed { at, .. } => now.duration_since(*at) < self.window,
    });

    match entries.get(key) {
      Some(Entry::InFlight { .. }) => Err(CheckoutError::DuplicateSubmission),
      Some(Entry::Completed { order_id, .. }) => Ok(Claim::Completed(*order_id)),
      None => {
        entries.insert(key.clone(), Entry::InFlight { since: now });
        Ok(Claim::Fresh)
      }
    }
  }

  pub fn complete(&self, key: &SubmissionKey, order_id: Uuid) {
    self.entries.lock().insert(
      key.clone(),
      Entry::Completed {
        order_id,
        at: Instant::now(),
      },
    );
  }

  /// The order completed under `key`, if still inside the window. Does not claim.
  pub fn completed_order(&self, key: &SubmissionKey) -> Option<Uuid> {
    let now = Instant::now();
    match self.entries.lock().get(key) {
      Some(Entry::Completed { order_id, at }) if now.duration_since(*at) < self.window => Some(*order_id),
      _ => None,
    }
  }

  /// Drops an in-flight claim. A completed entry is left alone.
  pub fn release(&self, key: &SubmissionKey) {
    let mut entries = self.entries.lock();
    if matches!(entries.get(key), Some(Entry::InFlight { .. })) {
      entries.remove(key);
    }
  }
}
