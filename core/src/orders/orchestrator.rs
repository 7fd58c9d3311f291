// core/src/orders/orchestrator.rs

//! Order creation as a step flow over a `CreateOrderCtx`.
//!
//! Steps, in order:
//! 1. `validate_request`     buyer, cart, address and payment contact
//! 2. `claim_submission`     idempotency claim (undo: release the claim)
//! 3. `reserve_stock`        compare-and-decrement per line (undo: release)
//! 4. `price_order`          subtotal, delivery fee, total
//! 5. `persist_order`        order number + atomic header/lines insert
//! 6. `notify_store_owners`  optional, best effort
//!
//! A replayed submission stops the flow at step 2 with the existing order.
//! The flow runs on its own task, so dropping the caller's future never leaves
//! stock reserved or a submission claimed without an order behind them.

use super::idempotency::{Claim, SubmissionGuard, SubmissionKey};
use super::number::OrderNumberSource;
use crate::config::CheckoutConfig;
use crate::delivery::{DeliveryCalculator, DeliveryQuote};
use crate::error::{CheckoutError, CheckoutResult, FlowError};
use crate::flow::{ContextData, Flow, FlowOutcome, StepControl};
use crate::model::{
  BuyerRef, CartSnapshot, Money, Order, OrderLine, OrderNumber, OrderState, PaymentMethod, ShippingAddress, VariantRef,
};
use crate::payment::Msisdn;
use crate::store::{Inventory, NotificationKind, NotificationSink, OrderNotification, OrderStore, StoreError};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, instrument, Instrument, Level};
use uuid::Uuid;

pub const STEP_VALIDATE_REQUEST: &str = "validate_request";
pub const STEP_CLAIM_SUBMISSION: &str = "claim_submission";
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";
pub const STEP_PRICE_ORDER: &str = "price_order";
pub const STEP_PERSIST_ORDER: &str = "persist_order";
pub const STEP_NOTIFY_STORE_OWNERS: &str = "notify_store_owners";

/// Input to order creation.
#[derive(Debug, Clone)]
pub struct OrderRequest {
  /// `None` when the caller is not authenticated.
  pub buyer: Option<BuyerRef>,
  pub cart: CartSnapshot,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  /// MSISDN for mobile money; ignored by the other methods.
  pub payment_contact: Option<String>,
  pub idempotency_key: Option<String>,
}

/// Result of `place_order`: the order, and whether it already existed.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
  pub order: Order,
  pub replayed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pricing {
  subtotal: Money,
  shipping_fee: Money,
  total: Money,
}

/// Collaborators every step reaches through the context.
#[derive(Clone)]
struct Deps {
  inventory: Arc<dyn Inventory>,
  orders: Arc<dyn OrderStore>,
  notifications: Arc<dyn NotificationSink>,
  order_numbers: Arc<dyn OrderNumberSource>,
  submissions: Arc<SubmissionGuard>,
  delivery: DeliveryCalculator,
  order_number_max_attempts: u32,
}

/// Working state of one `create_order` run.
pub struct CreateOrderCtx {
  deps: Deps,
  request: OrderRequest,
  buyer: Option<BuyerRef>,
  submission_key: Option<SubmissionKey>,
  claim_held: bool,
  reserved: Vec<(VariantRef, u32)>,
  quote: Option<DeliveryQuote>,
  pricing: Option<Pricing>,
  order: Option<Order>,
  replayed: bool,
}

impl CreateOrderCtx {
  fn new(deps: Deps, request: OrderRequest) -> Self {
    Self {
      deps,
      request,
      buyer: None,
      submission_key: None,
      claim_held: false,
      reserved: Vec::new(),
      quote: None,
      pricing: None,
      order: None,
      replayed: false,
    }
  }
}

fn missing(what: &'static str) -> CheckoutError {
  CheckoutError::Flow(FlowError::MissingOutput {
    flow: "create_order".to_string(),
    what,
  })
}

pub struct OrderOrchestrator {
  deps: Deps,
  flow: Arc<Flow<CreateOrderCtx, CheckoutError>>,
}

impl OrderOrchestrator {
  pub fn new(
    inventory: Arc<dyn Inventory>,
    orders: Arc<dyn OrderStore>,
    notifications: Arc<dyn NotificationSink>,
    order_numbers: Arc<dyn OrderNumberSource>,
    config: &CheckoutConfig,
  ) -> Self {
    let deps = Deps {
      inventory,
      orders,
      notifications,
      order_numbers,
      submissions: Arc::new(SubmissionGuard::new(config.dedupe_window)),
      delivery: DeliveryCalculator::new(),
      order_number_max_attempts: config.order_number_max_attempts.max(1),
    };
    Self {
      deps,
      flow: Arc::new(build_create_order_flow()),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.flow.step_names()
  }

  /// Creates the order, or returns the one already created for the same submission.
  #[instrument(
    name = "OrderOrchestrator::place_order",
    skip_all,
    fields(
      buyer = ?request.buyer.as_ref().map(BuyerRef::as_str),
      lines = request.cart.lines.len(),
      method = %request.payment_method,
    ),
    err(Display)
  )]
  pub async fn place_order(&self, request: OrderRequest) -> CheckoutResult<OrderPlacement> {
    let ctx_data = ContextData::new(CreateOrderCtx::new(self.deps.clone(), request));
    let flow = self.flow.clone();
    let run_ctx = ctx_data.clone();
    let outcome = tokio::spawn(async move { flow.run(run_ctx).await }.in_current_span())
      .await
      .map_err(|join_err| {
        CheckoutError::Flow(FlowError::TaskFailed {
          flow: "create_order".to_string(),
          reason: join_err.to_string(),
        })
      })??;

    let (order, replayed) = ctx_data.update(|ctx| (ctx.order.take(), ctx.replayed));
    let order = order.ok_or_else(|| missing("an order"))?;
    match outcome {
      FlowOutcome::Completed => event!(Level::INFO, order_id = %order.id, order_number = %order.order_number, total = %order.total, "Order placed."),
      FlowOutcome::Stopped => event!(Level::INFO, order_id = %order.id, "Returning order from earlier identical submission."),
    }
    Ok(OrderPlacement { order, replayed })
  }

  /// The order an explicit idempotency key already produced, if any. Lets a
  /// resubmission be answered after the cart it came from is gone.
  pub async fn replay(&self, buyer: &BuyerRef, idempotency_key: Option<&str>) -> CheckoutResult<Option<Order>> {
    let Some(key) = idempotency_key.map(str::trim).filter(|k| !k.is_empty()) else {
      return Ok(None);
    };
    match self.deps.submissions.completed_order(&SubmissionKey::explicit(buyer, key)) {
      Some(order_id) => Ok(self.deps.orders.find_order(order_id).await?),
      None => Ok(None),
    }
  }

  pub async fn create_order(&self, request: OrderRequest) -> CheckoutResult<Order> {
    self.place_order(request).await.map(|placement| placement.order)
  }
}

fn build_create_order_flow() -> Flow<CreateOrderCtx, CheckoutError> {
  let mut flow = Flow::<CreateOrderCtx, CheckoutError>::new(
    "create_order",
    &[
      (STEP_VALIDATE_REQUEST, false),
      (STEP_CLAIM_SUBMISSION, false),
      (STEP_RESERVE_STOCK, false),
      (STEP_PRICE_ORDER, false),
      (STEP_PERSIST_ORDER, false),
      (STEP_NOTIFY_STORE_OWNERS, true),
    ],
  );

  flow.on_step(STEP_VALIDATE_REQUEST, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let mut guard = ctx_data.write();
    let buyer = guard
      .request
      .buyer
      .clone()
      .filter(|b| !b.as_str().trim().is_empty())
      .ok_or(CheckoutError::NotAuthenticated)?;

    let request = &guard.request;
    if request.cart.is_empty() {
      return Err(CheckoutError::EmptyCart);
    }
    if request.cart.buyer != buyer {
      return Err(CheckoutError::Validation("cart belongs to a different buyer".to_string()));
    }
    request.shipping_address.validate()?;
    if request.payment_method.requires_msisdn() {
      let contact = request
        .payment_contact
        .as_deref()
        .ok_or_else(|| CheckoutError::Validation("a mobile money number is required".to_string()))?;
      Msisdn::parse(contact)?;
    }

    guard.buyer = Some(buyer);
    Ok::<_, CheckoutError>(StepControl::Continue)
  });

  flow.on_step(STEP_CLAIM_SUBMISSION, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (key, submissions, orders) = {
      let guard = ctx_data.read();
      let buyer = guard.buyer.as_ref().ok_or_else(|| missing("a validated buyer"))?;
      let key = SubmissionKey::derive(buyer, guard.request.idempotency_key.as_deref(), &guard.request.cart.cart_hash);
      (key, guard.deps.submissions.clone(), guard.deps.orders.clone())
    };

    match submissions.claim(&key)? {
      Claim::Fresh => {
        ctx_data.update(|ctx| {
          ctx.submission_key = Some(key);
          ctx.claim_held = true;
        });
        Ok::<_, CheckoutError>(StepControl::Continue)
      }
      Claim::Completed(order_id) => {
        let existing = orders
          .find_order(order_id)
          .await?
          .ok_or(CheckoutError::OrderNotFound(order_id))?;
        ctx_data.update(|ctx| {
          ctx.order = Some(existing);
          ctx.replayed = true;
        });
        Ok(StepControl::Stop)
      }
    }
  });
  flow.compensate(STEP_CLAIM_SUBMISSION, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (key, submissions) = ctx_data.update(|ctx| {
      let held = std::mem::take(&mut ctx.claim_held);
      (ctx.submission_key.clone().filter(|_| held), ctx.deps.submissions.clone())
    });
    if let Some(key) = key {
      submissions.release(&key);
      event!(Level::DEBUG, submission = %key, "Released submission claim.");
    }
  });

  flow.on_step(STEP_RESERVE_STOCK, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (lines, inventory) = {
      let guard = ctx_data.read();
      (guard.request.cart.lines.clone(), guard.deps.inventory.clone())
    };

    // One reservation per variant, even if a cart ever carries it twice.
    let mut wanted: BTreeMap<VariantRef, u32> = BTreeMap::new();
    for line in lines.iter() {
      let entry = wanted.entry(line.variant_ref.clone()).or_default();
      *entry = entry.checked_add(line.quantity).ok_or(CheckoutError::AmountOverflow)?;
    }

    for (variant, quantity) in wanted {
      if !inventory.try_reserve(&variant, quantity).await? {
        event!(Level::INFO, variant = %variant, quantity, "Stock no longer available.");
        return Err(CheckoutError::StockConflict {
          variant,
          requested: quantity,
        });
      }
      ctx_data.update(|ctx| ctx.reserved.push((variant, quantity)));
    }
    Ok(StepControl::Continue)
  });
  flow.compensate(STEP_RESERVE_STOCK, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (reserved, inventory) = ctx_data.update(|ctx| (std::mem::take(&mut ctx.reserved), ctx.deps.inventory.clone()));
    for (variant, quantity) in reserved {
      match inventory.release(&variant, quantity).await {
        Ok(()) => event!(Level::DEBUG, variant = %variant, quantity, "Released reserved stock."),
        Err(e) => event!(Level::ERROR, variant = %variant, quantity, error = %e, "Failed to release reserved stock."),
      }
    }
  });

  flow.on_step(STEP_PRICE_ORDER, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let mut guard = ctx_data.write();
    let line_totals = guard
      .request
      .cart
      .lines
      .iter()
      .map(|l| l.subtotal().ok_or(CheckoutError::AmountOverflow))
      .collect::<CheckoutResult<Vec<_>>>()?;
    let subtotal = Money::checked_sum(line_totals).ok_or(CheckoutError::AmountOverflow)?;
    let quote = guard.deps.delivery.quote(&guard.request.shipping_address.city);
    let total = subtotal.checked_add(quote.fee).ok_or(CheckoutError::AmountOverflow)?;

    if !quote.known_destination {
      event!(Level::INFO, city = %quote.city, "Unknown destination, using fallback delivery fee.");
    }
    guard.pricing = Some(Pricing {
      subtotal,
      shipping_fee: quote.fee,
      total,
    });
    guard.quote = Some(quote);
    Ok::<_, CheckoutError>(StepControl::Continue)
  });

  flow.on_step(STEP_PERSIST_ORDER, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (mut order, deps, key) = {
      let guard = ctx_data.read();
      let created_at = Utc::now();
      let first_number = guard.deps.order_numbers.next_number(created_at.date_naive());
      (
        draft_order(&guard, first_number, created_at)?,
        guard.deps.clone(),
        guard.submission_key.clone(),
      )
    };

    let created_on = order.created_at.date_naive();
    let mut stored = false;
    for attempt in 1..=deps.order_number_max_attempts {
      if attempt > 1 {
        order.order_number = deps.order_numbers.next_number(created_on);
      }
      match deps.orders.insert_order(&order).await {
        Ok(()) => {
          stored = true;
          break;
        }
        Err(StoreError::DuplicateOrderNumber(number)) => {
          event!(Level::WARN, order_number = %number, attempt, "Order number collision, regenerating.");
        }
        Err(e) => return Err(e.into()),
      }
    }
    if !stored {
      return Err(CheckoutError::OrderNumberExhausted {
        attempts: deps.order_number_max_attempts,
      });
    }

    if let Some(key) = key {
      deps.submissions.complete(&key, order.id);
    }
    ctx_data.update(|ctx| {
      ctx.claim_held = false;
      ctx.order = Some(order);
    });
    Ok(StepControl::Continue)
  });

  flow.on_step(STEP_NOTIFY_STORE_OWNERS, |ctx_data: ContextData<CreateOrderCtx>| async move {
    let (order, sink) = {
      let guard = ctx_data.read();
      (guard.order.clone().ok_or_else(|| missing("an order"))?, guard.deps.notifications.clone())
    };

    let notifications: Vec<OrderNotification> = order
      .stores()
      .into_iter()
      .map(|store_ref| {
        let store_lines: Vec<&OrderLine> = order.lines.iter().filter(|l| l.store_ref == store_ref).collect();
        let units: u32 = store_lines.iter().map(|l| l.quantity).sum();
        let amount = Money::checked_sum(store_lines.iter().map(|l| l.subtotal)).unwrap_or(Money::ZERO);
        OrderNotification {
          summary: format!("New order {}: {} unit(s), {}", order.order_number, units, amount),
          store_ref,
          order_id: order.id,
          order_number: order.order_number.clone(),
          kind: NotificationKind::NewOrder,
        }
      })
      .collect();

    let results = join_all(notifications.iter().map(|n| sink.notify(n))).await;
    for (notification, result) in notifications.iter().zip(results) {
      if let Err(e) = result {
        event!(Level::WARN, store = %notification.store_ref, order_id = %order.id, error = %e, "Store owner notification failed.");
      }
    }
    Ok::<_, CheckoutError>(StepControl::Continue)
  });

  flow
}

/// Builds the order from the validated, reserved and priced context.
fn draft_order(ctx: &CreateOrderCtx, order_number: OrderNumber, created_at: DateTime<Utc>) -> CheckoutResult<Order> {
  let buyer = ctx.buyer.clone().ok_or_else(|| missing("a validated buyer"))?;
  let pricing = ctx.pricing.ok_or_else(|| missing("pricing"))?;
  let quote = ctx.quote.as_ref().ok_or_else(|| missing("a delivery quote"))?;

  let order_id = Uuid::new_v4();
  let lines = ctx
    .request
    .cart
    .lines
    .iter()
    .map(|l| {
      Ok(OrderLine {
        order_id,
        variant_ref: l.variant_ref.clone(),
        store_ref: l.store_ref.clone(),
        product_name: l.product_name.clone(),
        quantity: l.quantity,
        unit_price: l.unit_price,
        subtotal: l.subtotal().ok_or(CheckoutError::AmountOverflow)?,
      })
    })
    .collect::<CheckoutResult<Vec<_>>>()?;
  let initial = OrderState::initial();

  Ok(Order {
    id: order_id,
    order_number,
    buyer,
    lines,
    subtotal: pricing.subtotal,
    shipping_fee: pricing.shipping_fee,
    total: pricing.total,
    shipping_address: ctx.request.shipping_address.clone(),
    payment_method: ctx.request.payment_method,
    payment_status: initial.payment_status,
    order_status: initial.order_status,
    created_at,
    estimated_delivery: quote.estimated_delivery(created_at.date_naive()),
  })
}
