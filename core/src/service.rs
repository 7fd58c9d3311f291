// core/src/service.rs

//! `CheckoutService`: the one entry point the HTTP layer talks to.

use crate::cart::CartLedger;
use crate::config::CheckoutConfig;
use crate::delivery::{DeliveryCalculator, DeliveryQuote};
use crate::error::{CheckoutError, CheckoutResult};
use crate::model::{AttemptStatus, BuyerRef, Order, OrderStatus, PaymentAttempt, PaymentMethod, ShippingAddress};
use crate::orders::{OrderNumberSource, OrderOrchestrator, OrderRequest, OrderStatusMachine, TransitionOutcome};
use crate::payment::{
  CallbackDisposition, InitiationKind, PaymentAdapter, PaymentCallback, PaymentGateway, PaymentInstructions,
  PaymentStatusTracker, PaymentWatch,
};
use crate::store::{CartSessionStore, Inventory, NotificationSink, OrderStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Everything the service needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
  pub inventory: Arc<dyn Inventory>,
  pub orders: Arc<dyn OrderStore>,
  pub carts: Arc<dyn CartSessionStore>,
  pub notifications: Arc<dyn NotificationSink>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub order_numbers: Arc<dyn OrderNumberSource>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  pub buyer: Option<BuyerRef>,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub payment_contact: Option<String>,
  pub idempotency_key: Option<String>,
}

/// Where payment stands right after checkout or a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentStep {
  /// Waiting on the provider; the order moves once it answers.
  Pending {
    provider_reference: String,
    instructions: PaymentInstructions,
  },
  /// Nothing to wait for on our side.
  Immediate { instructions: PaymentInstructions },
  /// The order exists but payment could not be started; the buyer can retry.
  InitiationFailed { reason: String },
  /// Same submission seen before; payment was handled by the first one.
  Replayed,
}

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
  pub order: Order,
  pub payment: PaymentStep,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
  pub order: Order,
  pub attempts: Vec<PaymentAttempt>,
  pub payment_tracking: bool,
}

/// Who asks for a cancellation. Buyers can only cancel their own orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelActor {
  Buyer(BuyerRef),
  Store,
}

#[derive(Clone)]
pub struct CheckoutService {
  config: CheckoutConfig,
  orders: Arc<dyn OrderStore>,
  inventory: Arc<dyn Inventory>,
  cart: CartLedger,
  delivery: DeliveryCalculator,
  orchestrator: Arc<OrderOrchestrator>,
  adapter: Arc<PaymentAdapter>,
  tracker: PaymentStatusTracker,
  status: OrderStatusMachine,
}

impl CheckoutService {
  pub fn new(collaborators: Collaborators, config: CheckoutConfig) -> Self {
    let Collaborators {
      inventory,
      orders,
      carts,
      notifications,
      gateway,
      order_numbers,
    } = collaborators;

    let status = OrderStatusMachine::new(orders.clone());
    let orchestrator = OrderOrchestrator::new(inventory.clone(), orders.clone(), notifications, order_numbers, &config);
    let adapter = PaymentAdapter::new(gateway.clone(), orders.clone(), config.bank_transfer.clone());
    let tracker = PaymentStatusTracker::new(gateway, orders.clone(), status.clone(), config.payment_poll_interval);

    Self {
      cart: CartLedger::new(inventory.clone(), carts),
      delivery: DeliveryCalculator::new(),
      orchestrator: Arc::new(orchestrator),
      adapter: Arc::new(adapter),
      tracker,
      status,
      orders,
      inventory,
      config,
    }
  }

  pub fn cart(&self) -> &CartLedger {
    &self.cart
  }

  pub fn config(&self) -> &CheckoutConfig {
    &self.config
  }

  pub fn quote_delivery(&self, city: &str) -> DeliveryQuote {
    self.delivery.quote(city)
  }

  /// Turns the buyer's cart into an order and starts payment.
  ///
  /// Once the order exists this does not fail because of payment: a push the
  /// provider refuses is reported as `PaymentStep::InitiationFailed`.
  #[instrument(
    name = "CheckoutService::checkout",
    skip_all,
    fields(buyer = ?request.buyer.as_ref().map(BuyerRef::as_str), method = %request.payment_method),
    err(Display)
  )]
  pub async fn checkout(&self, request: CheckoutRequest) -> CheckoutResult<CheckoutReceipt> {
    let buyer = request.buyer.clone().ok_or(CheckoutError::NotAuthenticated)?;
    let snapshot = match self.cart.snapshot_for_checkout(&buyer).await {
      Ok(snapshot) => snapshot,
      Err(CheckoutError::EmptyCart) => {
        return match self.orchestrator.replay(&buyer, request.idempotency_key.as_deref()).await? {
          Some(order) => Ok(CheckoutReceipt {
            order,
            payment: PaymentStep::Replayed,
          }),
          None => Err(CheckoutError::EmptyCart),
        };
      }
      Err(e) => return Err(e),
    };

    let placement = self
      .orchestrator
      .place_order(OrderRequest {
        buyer: Some(buyer.clone()),
        cart: snapshot,
        shipping_address: request.shipping_address,
        payment_method: request.payment_method,
        payment_contact: request.payment_contact.clone(),
        idempotency_key: request.idempotency_key,
      })
      .await?;
    if placement.replayed {
      return Ok(CheckoutReceipt {
        order: placement.order,
        payment: PaymentStep::Replayed,
      });
    }

    let order = placement.order;
    if let Err(e) = self.cart.clear(&buyer).await {
      event!(Level::WARN, order_id = %order.id, error = %e, "Order placed but cart could not be cleared.");
    }

    let payment = match self.start_payment(&order, request.payment_contact.as_deref()).await {
      Ok(step) => step,
      Err(e) => {
        event!(Level::ERROR, order_id = %order.id, error = %e, "Payment initiation failed, order left retryable.");
        PaymentStep::InitiationFailed { reason: e.to_string() }
      }
    };

    let order = self.reload(order).await;
    Ok(CheckoutReceipt { order, payment })
  }

  /// Starts a new mobile money attempt after the previous one failed or expired.
  #[instrument(name = "CheckoutService::retry_payment", skip(self, buyer, contact), fields(buyer = %buyer), err(Display))]
  pub async fn retry_payment(&self, buyer: &BuyerRef, order_id: Uuid, contact: Option<&str>) -> CheckoutResult<CheckoutReceipt> {
    let order = self.owned_order(buyer, order_id).await?;
    if order.payment_method != PaymentMethod::MobileMoney {
      return Err(CheckoutError::PaymentNotRetryable {
        order_id,
        reason: format!("{} payments are not retried online", order.payment_method),
      });
    }
    if self.tracker.is_tracking(order_id) {
      return Err(CheckoutError::PaymentInFlight { order_id });
    }

    self.status.reopen_payment(order_id).await?;
    let payment = self.start_payment(&order, contact).await?;
    let order = self.reload(order).await;
    Ok(CheckoutReceipt { order, payment })
  }

  pub async fn handle_payment_callback(&self, callback: PaymentCallback) -> CheckoutResult<CallbackDisposition> {
    self.tracker.handle_callback(callback).await
  }

  /// Cancels a `pending` or `confirmed` order, stops payment tracking and
  /// returns reserved stock. Cancelling twice is a no-op.
  #[instrument(name = "CheckoutService::cancel_order", skip(self), err(Display))]
  pub async fn cancel_order(&self, order_id: Uuid, actor: CancelActor) -> CheckoutResult<Order> {
    let order = match &actor {
      CancelActor::Buyer(buyer) => self.owned_order(buyer, order_id).await?,
      CancelActor::Store => self.find_order(order_id).await?,
    };

    let outcome = self.status.transition(order_id, OrderStatus::Cancelled).await?;
    if let TransitionOutcome::Applied(_) = outcome {
      if self.tracker.abort(order_id) {
        event!(Level::INFO, order_id = %order_id, "Aborted payment tracking for cancelled order.");
      }
      for line in &order.lines {
        if let Err(e) = self.inventory.release(&line.variant_ref, line.quantity).await {
          event!(Level::ERROR, order_id = %order_id, variant = %line.variant_ref, error = %e, "Could not release stock of cancelled order.");
        }
      }
    }
    Ok(self.reload(order).await)
  }

  /// `confirmed -> shipped -> delivered`.
  #[instrument(name = "CheckoutService::advance_fulfilment", skip(self, to), fields(to = %to), err(Display))]
  pub async fn advance_fulfilment(&self, order_id: Uuid, to: OrderStatus) -> CheckoutResult<Order> {
    if !matches!(to, OrderStatus::Shipped | OrderStatus::Delivered) {
      return Err(CheckoutError::Validation(format!("'{}' is not a fulfilment status", to)));
    }
    let order = self.find_order(order_id).await?;
    self.status.transition(order_id, to).await?;
    Ok(self.reload(order).await)
  }

  /// The order with its payment attempts. With `buyer` set, only that buyer's orders are visible.
  pub async fn order_view(&self, buyer: Option<&BuyerRef>, order_id: Uuid) -> CheckoutResult<OrderView> {
    let order = match buyer {
      Some(buyer) => self.owned_order(buyer, order_id).await?,
      None => self.find_order(order_id).await?,
    };
    let attempts = self.orders.attempts_for_order(order_id).await?;
    Ok(OrderView {
      order,
      attempts,
      payment_tracking: self.tracker.is_tracking(order_id),
    })
  }

  pub fn payment_watch(&self, order_id: Uuid) -> Option<PaymentWatch> {
    self.tracker.watch(order_id)
  }

  async fn start_payment(&self, order: &Order, contact: Option<&str>) -> CheckoutResult<PaymentStep> {
    let initiation = self.adapter.initiate(order, contact).await?;
    match (initiation.kind, initiation.attempt, initiation.provider_reference) {
      (InitiationKind::Pending, Some(mut attempt), Some(provider_reference)) => {
        // A cancel that landed during the push found no tracker to stop.
        if self.is_cancelled(order.id).await? {
          attempt.resolve(AttemptStatus::Failed, Some("aborted".to_string()));
          self.orders.save_attempt(&attempt).await?;
          event!(Level::INFO, order_id = %order.id, attempt_id = %attempt.id, "Order cancelled during push, not tracking.");
          return Err(cancelled_during_payment(order.id));
        }
        self.tracker.track(attempt, self.config.payment_max_wait)?;
        if self.is_cancelled(order.id).await? {
          self.tracker.abort(order.id);
          return Err(cancelled_during_payment(order.id));
        }
        Ok(PaymentStep::Pending {
          provider_reference,
          instructions: initiation.instructions,
        })
      }
      (InitiationKind::Pending, _, _) => Err(CheckoutError::PaymentInitiationFailed(
        "provider did not return a reference".to_string(),
      )),
      (InitiationKind::Immediate, _, _) => {
        if order.payment_method == PaymentMethod::CashOnDelivery {
          self.status.transition(order.id, OrderStatus::Confirmed).await?;
        }
        Ok(PaymentStep::Immediate {
          instructions: initiation.instructions,
        })
      }
    }
  }

  async fn find_order(&self, order_id: Uuid) -> CheckoutResult<Order> {
    self
      .orders
      .find_order(order_id)
      .await?
      .ok_or(CheckoutError::OrderNotFound(order_id))
  }

  async fn is_cancelled(&self, order_id: Uuid) -> CheckoutResult<bool> {
    Ok(self.find_order(order_id).await?.order_status == OrderStatus::Cancelled)
  }

  /// Other buyers' orders look exactly like missing ones.
  async fn owned_order(&self, buyer: &BuyerRef, order_id: Uuid) -> CheckoutResult<Order> {
    let order = self.find_order(order_id).await?;
    if &order.buyer != buyer {
      return Err(CheckoutError::OrderNotFound(order_id));
    }
    Ok(order)
  }

  /// Latest stored copy, falling back to `order` if the read fails.
  async fn reload(&self, order: Order) -> Order {
    match self.orders.find_order(order.id).await {
      Ok(Some(fresh)) => fresh,
      Ok(None) => order,
      Err(e) => {
        event!(Level::WARN, order_id = %order.id, error = %e, "Could not reload order, returning last known copy.");
        order
      }
    }
  }
}

fn cancelled_during_payment(order_id: Uuid) -> CheckoutError {
  CheckoutError::PaymentNotRetryable {
    order_id,
    reason: "order was cancelled".to_string(),
  }
}
