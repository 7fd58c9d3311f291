// core/src/config.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Details printed on bank-transfer payment instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferDetails {
  pub bank_name: String,
  pub account_number: String,
  pub account_holder: String,
}

impl Default for BankTransferDetails {
  fn default() -> Self {
    Self {
      bank_name: "Millennium BIM".to_string(),
      account_number: "0000000000000".to_string(),
      account_holder: "LMI Marketplace, Lda".to_string(),
    }
  }
}

/// Tunables for the checkout core. The server fills this from the environment.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
  /// How often a tracker asks the gateway about a pending attempt.
  pub payment_poll_interval: Duration,
  /// After this long without a terminal outcome the attempt is `expired`.
  pub payment_max_wait: Duration,
  /// Window in which a resubmitted identical cart replays the first order.
  pub dedupe_window: Duration,
  pub order_number_max_attempts: u32,
  pub bank_transfer: BankTransferDetails,
}

impl Default for CheckoutConfig {
  fn default() -> Self {
    Self {
      payment_poll_interval: Duration::from_secs(5),
      payment_max_wait: Duration::from_secs(180),
      dedupe_window: Duration::from_secs(30),
      order_number_max_attempts: 5,
      bank_transfer: BankTransferDetails::default(),
    }
  }
}
