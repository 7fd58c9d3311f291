// core/src/payment/gateway.rs

use super::msisdn::Msisdn;
use crate::model::{Money, PaymentOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
  /// The provider answered and said no (bad number, limits, ...).
  #[error("Payment provider rejected the request: {0}")]
  Rejected(String),

  #[error("Payment provider unreachable. Source: {0}")]
  Unreachable(#[source] anyhow::Error),

  #[error("Unexpected payment provider response: {0}")]
  Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
  pub provider_reference: String,
}

/// Provider-side state of a push payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderStatus {
  Pending,
  Succeeded,
  Failed { reason: Option<String> },
}

impl ProviderStatus {
  /// `None` while the provider is still waiting on the buyer.
  pub fn into_outcome(self) -> Option<PaymentOutcome> {
    match self {
      ProviderStatus::Pending => None,
      ProviderStatus::Succeeded => Some(PaymentOutcome::Succeeded),
      ProviderStatus::Failed { reason } => Some(PaymentOutcome::Failed { reason }),
    }
  }
}

/// Inbound notification from the provider about one push payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallback {
  pub provider_reference: String,
  pub outcome: PaymentOutcome,
}

/// Mobile money push provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Asks the provider to prompt `msisdn` for `amount`. `merchant_reference` is
  /// our order number and shows up on the buyer's handset.
  async fn initiate_push(
    &self,
    msisdn: &Msisdn,
    amount: Money,
    merchant_reference: &str,
  ) -> Result<PushReceipt, GatewayError>;

  async fn query_status(&self, provider_reference: &str) -> Result<ProviderStatus, GatewayError>;
}
