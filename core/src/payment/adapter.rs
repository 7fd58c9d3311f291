// core/src/payment/adapter.rs

use super::gateway::PaymentGateway;
use super::msisdn::Msisdn;
use crate::config::BankTransferDetails;
use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{AttemptStatus, Money, Order, PaymentAttempt, PaymentMethod};
use crate::store::OrderStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiationKind {
  /// Nothing to wait for: the buyer has what they need to pay.
  Immediate,
  /// The provider will report back; a tracker should follow the attempt.
  Pending,
}

/// What the buyer is shown after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstructions {
  MobileMoney {
    msisdn: String,
    amount: Money,
    reference: String,
  },
  BankTransfer {
    bank_name: String,
    account_number: String,
    account_holder: String,
    reference: String,
    amount: Money,
  },
  CashOnDelivery {
    amount: Money,
    reference: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInitiationResult {
  pub kind: InitiationKind,
  /// Set for methods the provider resolves asynchronously.
  pub attempt: Option<PaymentAttempt>,
  pub instructions: PaymentInstructions,
  pub provider_reference: Option<String>,
}

/// Marks an order as mid-initiation for as long as it lives.
struct InitiationSlot<'a> {
  busy: &'a Mutex<HashSet<Uuid>>,
  order_id: Uuid,
}

impl<'a> InitiationSlot<'a> {
  fn acquire(busy: &'a Mutex<HashSet<Uuid>>, order_id: Uuid) -> Option<Self> {
    busy.lock().insert(order_id).then_some(InitiationSlot { busy, order_id })
  }
}

impl Drop for InitiationSlot<'_> {
  fn drop(&mut self) {
    self.busy.lock().remove(&self.order_id);
  }
}

/// Starts payment for an order with whichever method it was placed with.
pub struct PaymentAdapter {
  gateway: Arc<dyn PaymentGateway>,
  orders: Arc<dyn OrderStore>,
  bank: BankTransferDetails,
  initiating: Mutex<HashSet<Uuid>>,
}

impl PaymentAdapter {
  pub fn new(gateway: Arc<dyn PaymentGateway>, orders: Arc<dyn OrderStore>, bank: BankTransferDetails) -> Self {
    Self {
      gateway,
      orders,
      bank,
      initiating: Mutex::new(HashSet::new()),
    }
  }

  #[instrument(
    name = "PaymentAdapter::initiate",
    skip_all,
    fields(order_id = %order.id, method = %order.payment_method),
    err(Display)
  )]
  pub async fn initiate(&self, order: &Order, contact: Option<&str>) -> CheckoutResult<PaymentInitiationResult> {
    let reference = order.order_number.to_string();
    match order.payment_method {
      PaymentMethod::BankTransfer => Ok(PaymentInitiationResult {
        kind: InitiationKind::Immediate,
        attempt: None,
        instructions: PaymentInstructions::BankTransfer {
          bank_name: self.bank.bank_name.clone(),
          account_number: self.bank.account_number.clone(),
          account_holder: self.bank.account_holder.clone(),
          reference,
          amount: order.total,
        },
        provider_reference: None,
      }),
      PaymentMethod::CashOnDelivery => Ok(PaymentInitiationResult {
        kind: InitiationKind::Immediate,
        attempt: None,
        instructions: PaymentInstructions::CashOnDelivery {
          amount: order.total,
          reference,
        },
        provider_reference: None,
      }),
      PaymentMethod::MobileMoney => {
        let contact = contact.ok_or_else(|| CheckoutError::Validation("a mobile money number is required".to_string()))?;
        let msisdn = Msisdn::parse(contact)?;
        self.initiate_push(order, msisdn).await
      }
    }
  }

  async fn initiate_push(&self, order: &Order, msisdn: Msisdn) -> CheckoutResult<PaymentInitiationResult> {
    let _slot = InitiationSlot::acquire(&self.initiating, order.id).ok_or(CheckoutError::PaymentInFlight { order_id: order.id })?;

    let attempts = self.orders.attempts_for_order(order.id).await?;
    if attempts.iter().any(|a| a.status.is_active()) {
      return Err(CheckoutError::PaymentInFlight { order_id: order.id });
    }

    let mut attempt = PaymentAttempt::start(order.id, PaymentMethod::MobileMoney);
    self.orders.save_attempt(&attempt).await?;

    match self.gateway.initiate_push(&msisdn, order.total, order.order_number.as_str()).await {
      Ok(receipt) => {
        attempt.provider_reference = Some(receipt.provider_reference.clone());
        attempt.status = AttemptStatus::Pending;
        self.orders.save_attempt(&attempt).await?;
        event!(
          Level::INFO,
          attempt_id = %attempt.id,
          provider_reference = %receipt.provider_reference,
          "Mobile money push sent."
        );
        Ok(PaymentInitiationResult {
          kind: InitiationKind::Pending,
          instructions: PaymentInstructions::MobileMoney {
            msisdn: msisdn.to_string(),
            amount: order.total,
            reference: order.order_number.to_string(),
          },
          provider_reference: Some(receipt.provider_reference),
          attempt: Some(attempt),
        })
      }
      Err(gateway_err) => {
        event!(Level::ERROR, attempt_id = %attempt.id, error = %gateway_err, "Mobile money push failed.");
        attempt.resolve(AttemptStatus::Failed, Some(gateway_err.to_string()));
        if let Err(store_err) = self.orders.save_attempt(&attempt).await {
          event!(Level::ERROR, attempt_id = %attempt.id, error = %store_err, "Could not record failed attempt.");
        }
        Err(CheckoutError::PaymentInitiationFailed(gateway_err.to_string()))
      }
    }
  }
}
