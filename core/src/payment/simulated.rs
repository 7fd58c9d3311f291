// core/src/payment/simulated.rs

//! A scriptable stand-in for the mobile money provider.

use super::gateway::{GatewayError, PaymentGateway, ProviderStatus, PushReceipt};
use super::msisdn::Msisdn;
use crate::model::Money;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{event, Level};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPush {
  pub msisdn: String,
  pub amount: Money,
  pub merchant_reference: String,
  pub provider_reference: String,
}

/// Every push is accepted and stays `Pending` until scripted otherwise with
/// `set_status`, or until the webhook endpoint delivers an outcome.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
  statuses: Mutex<HashMap<String, ProviderStatus>>,
  pushes: Mutex<Vec<RecordedPush>>,
  reject_with: Mutex<Option<String>>,
  next_reference: AtomicU64,
  queries: AtomicU64,
}

impl SimulatedGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every following push fail with `reason`, or succeed again with `None`.
  pub fn reject_pushes(&self, reason: Option<&str>) {
    *self.reject_with.lock() = reason.map(str::to_string);
  }

  /// What `query_status` reports for `provider_reference` from now on.
  pub fn set_status(&self, provider_reference: &str, status: ProviderStatus) {
    self.statuses.lock().insert(provider_reference.to_string(), status);
  }

  pub fn pushes(&self) -> Vec<RecordedPush> {
    self.pushes.lock().clone()
  }

  pub fn last_reference(&self) -> Option<String> {
    self.pushes.lock().last().map(|p| p.provider_reference.clone())
  }

  pub fn query_count(&self) -> u64 {
    self.queries.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
  async fn initiate_push(
    &self,
    msisdn: &Msisdn,
    amount: Money,
    merchant_reference: &str,
  ) -> Result<PushReceipt, GatewayError> {
    if let Some(reason) = self.reject_with.lock().clone() {
      return Err(GatewayError::Rejected(reason));
    }
    let provider_reference = format!("SIM-{:06}", self.next_reference.fetch_add(1, Ordering::SeqCst) + 1);
    self.statuses.lock().insert(provider_reference.clone(), ProviderStatus::Pending);
    self.pushes.lock().push(RecordedPush {
      msisdn: msisdn.international(),
      amount,
      merchant_reference: merchant_reference.to_string(),
      provider_reference: provider_reference.clone(),
    });
    event!(Level::DEBUG, %provider_reference, merchant_reference, %amount, "Simulated push accepted.");
    Ok(PushReceipt { provider_reference })
  }

  async fn query_status(&self, provider_reference: &str) -> Result<ProviderStatus, GatewayError> {
    self.queries.fetch_add(1, Ordering::SeqCst);
    self
      .statuses
      .lock()
      .get(provider_reference)
      .cloned()
      .ok_or_else(|| GatewayError::Protocol(format!("unknown reference {}", provider_reference)))
  }
}
