// core/src/model/payment.rs

use crate::error::CheckoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  /// Provider push to the buyer's handset; resolves asynchronously.
  MobileMoney,
  /// Buyer pays by transfer using the instructions we hand back.
  BankTransfer,
  /// Collected by the courier.
  CashOnDelivery,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::MobileMoney => "mobile_money",
      PaymentMethod::BankTransfer => "bank_transfer",
      PaymentMethod::CashOnDelivery => "cash_on_delivery",
    }
  }

  pub fn requires_msisdn(self) -> bool {
    matches!(self, PaymentMethod::MobileMoney)
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentMethod {
  type Err = CheckoutError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "mobile_money" => Ok(PaymentMethod::MobileMoney),
      "bank_transfer" => Ok(PaymentMethod::BankTransfer),
      "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
      other => Err(CheckoutError::Validation(format!("unsupported payment method '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
  Initiated,
  Pending,
  Succeeded,
  Failed,
  Expired,
}

impl AttemptStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, AttemptStatus::Succeeded | AttemptStatus::Failed | AttemptStatus::Expired)
  }

  /// Counts against the one-live-attempt-per-order rule.
  pub fn is_active(self) -> bool {
    !self.is_terminal()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      AttemptStatus::Initiated => "initiated",
      AttemptStatus::Pending => "pending",
      AttemptStatus::Succeeded => "succeeded",
      AttemptStatus::Failed => "failed",
      AttemptStatus::Expired => "expired",
    }
  }
}

impl fmt::Display for AttemptStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AttemptStatus {
  type Err = CheckoutError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "initiated" => Ok(AttemptStatus::Initiated),
      "pending" => Ok(AttemptStatus::Pending),
      "succeeded" => Ok(AttemptStatus::Succeeded),
      "failed" => Ok(AttemptStatus::Failed),
      "expired" => Ok(AttemptStatus::Expired),
      other => Err(CheckoutError::Validation(format!("unknown attempt status '{}'", other))),
    }
  }
}

/// Final word from the provider about an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
  Succeeded,
  Failed { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
  pub id: Uuid,
  pub order_id: Uuid,
  pub method: PaymentMethod,
  /// Assigned by the provider; `None` until then.
  pub provider_reference: Option<String>,
  pub status: AttemptStatus,
  pub failure_reason: Option<String>,
  pub created_at: DateTime<Utc>,
  pub resolved_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
  pub fn start(order_id: Uuid, method: PaymentMethod) -> Self {
    PaymentAttempt {
      id: Uuid::new_v4(),
      order_id,
      method,
      provider_reference: None,
      status: AttemptStatus::Initiated,
      failure_reason: None,
      created_at: Utc::now(),
      resolved_at: None,
    }
  }

  /// Moves a live attempt to a terminal status. No-op (returns `false`) if already terminal.
  pub fn resolve(&mut self, status: AttemptStatus, reason: Option<String>) -> bool {
    if self.status.is_terminal() || !status.is_terminal() {
      return false;
    }
    self.status = status;
    self.failure_reason = reason;
    self.resolved_at = Some(Utc::now());
    true
  }

  pub fn resolve_with(&mut self, outcome: &PaymentOutcome) -> bool {
    match outcome {
      PaymentOutcome::Succeeded => self.resolve(AttemptStatus::Succeeded, None),
      PaymentOutcome::Failed { reason } => self.resolve(AttemptStatus::Failed, reason.clone()),
    }
  }
}
