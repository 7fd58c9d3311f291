// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every fixture

use chrono::NaiveDate;
use lmi_checkout::model::{BuyerRef, Money, OrderNumber, PaymentMethod, ShippingAddress, StoreRef, VariantRecord, VariantRef};
use lmi_checkout::orders::OrderNumberSource;
use lmi_checkout::payment::SimulatedGateway;
use lmi_checkout::store::memory::{MemoryCartSessions, MemoryInventory, MemoryOrderStore, RecordingNotificationSink};
use lmi_checkout::store::{Inventory, StoreResult};
use async_trait::async_trait;
use lmi_checkout::{CheckoutConfig, CheckoutRequest, CheckoutService, Collaborators, ContextData, FlowError, StepControl};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// --- Flow engine fixtures ---

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub steps_executed: Vec<String>,
  pub compensated: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Flow framework error: {0}")]
  Flow(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(fe.to_string())
  }
}

pub async fn record_step(ctx: ContextData<TestContext>, step_name: &'static str) -> Result<StepControl, TestError> {
  let mut guard = ctx.write();
  guard.counter += 1;
  guard.steps_executed.push(step_name.to_string());
  if guard.should_stop_at.as_deref() == Some(step_name) {
    return Ok(StepControl::Stop);
  }
  Ok(StepControl::Continue)
}

pub async fn fail_step(ctx: ContextData<TestContext>, step_name: &'static str) -> Result<StepControl, TestError> {
  ctx.write().steps_executed.push(step_name.to_string());
  Err(TestError::Handler(format!("{} failed", step_name)))
}

pub async fn record_compensation(ctx: ContextData<TestContext>, step_name: &'static str) {
  ctx.write().compensated.push(step_name.to_string());
}

// --- Tracing ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Domain fixtures ---

pub const STORE_A: &str = "store-a";
pub const STORE_B: &str = "store-b";
pub const VALID_MSISDN: &str = "+258841234567";

pub fn variant(id: &str, store: &str, price: i64, stock: u32) -> VariantRecord {
  VariantRecord {
    variant_ref: VariantRef::new(id),
    store_ref: StoreRef::new(store),
    product_name: format!("Product {}", id),
    price: Money::new(price),
    stock,
  }
}

pub fn buyer(id: &str) -> BuyerRef {
  BuyerRef::new(id)
}

pub fn address(city: &str) -> ShippingAddress {
  ShippingAddress {
    recipient_name: "Ana Machava".to_string(),
    phone: "841234567".to_string(),
    street: "Av. 24 de Julho, 1500".to_string(),
    city: city.to_string(),
    district: Some("KaMpfumo".to_string()),
    reference: None,
  }
}

pub fn checkout_request(buyer_id: &str, method: PaymentMethod, city: &str) -> CheckoutRequest {
  CheckoutRequest {
    buyer: Some(buyer(buyer_id)),
    shipping_address: address(city),
    payment_method: method,
    payment_contact: matches!(method, PaymentMethod::MobileMoney).then(|| VALID_MSISDN.to_string()),
    idempotency_key: None,
  }
}

/// Hands out scripted suffixes, then repeats the last one.
pub struct ScriptedOrderNumbers {
  suffixes: Mutex<VecDeque<u16>>,
  last: Mutex<u16>,
}

impl ScriptedOrderNumbers {
  pub fn new(suffixes: &[u16]) -> Self {
    Self {
      suffixes: Mutex::new(suffixes.iter().copied().collect()),
      last: Mutex::new(suffixes.first().copied().unwrap_or(0)),
    }
  }
}

impl OrderNumberSource for ScriptedOrderNumbers {
  fn next_number(&self, date: NaiveDate) -> OrderNumber {
    let suffix = match self.suffixes.lock().pop_front() {
      Some(s) => {
        *self.last.lock() = s;
        s
      }
      None => *self.last.lock(),
    };
    OrderNumber::compose(date, suffix)
  }
}

pub fn test_config() -> CheckoutConfig {
  CheckoutConfig {
    payment_poll_interval: Duration::from_secs(5),
    payment_max_wait: Duration::from_secs(60),
    ..CheckoutConfig::default()
  }
}

/// A `CheckoutService` wired to in-memory collaborators, with handles kept
/// for inspection.
pub struct Harness {
  pub inventory: Arc<MemoryInventory>,
  pub orders: Arc<MemoryOrderStore>,
  pub carts: Arc<MemoryCartSessions>,
  pub notifications: Arc<RecordingNotificationSink>,
  pub gateway: Arc<SimulatedGateway>,
  pub service: CheckoutService,
}

impl Harness {
  pub fn new(variants: Vec<VariantRecord>) -> Self {
    Self::with(variants, test_config(), Arc::new(lmi_checkout::orders::RandomOrderNumbers))
  }

  pub fn with(variants: Vec<VariantRecord>, config: CheckoutConfig, order_numbers: Arc<dyn OrderNumberSource>) -> Self {
    let inventory = Arc::new(MemoryInventory::with_variants(variants));
    let orders = Arc::new(MemoryOrderStore::new());
    let carts = Arc::new(MemoryCartSessions::new());
    let notifications = Arc::new(RecordingNotificationSink::new());
    let gateway = Arc::new(SimulatedGateway::new());

    let service = CheckoutService::new(
      Collaborators {
        inventory: inventory.clone(),
        orders: orders.clone(),
        carts: carts.clone(),
        notifications: notifications.clone(),
        gateway: gateway.clone(),
        order_numbers,
      },
      config,
    );

    Self {
      inventory,
      orders,
      carts,
      notifications,
      gateway,
      service,
    }
  }

  pub fn stock(&self, variant_id: &str) -> u32 {
    self.inventory.stock_of(&VariantRef::new(variant_id)).unwrap_or(0)
  }

  /// Puts `quantity` of `variant_id` in the buyer's cart.
  pub async fn fill_cart(&self, buyer_id: &str, variant_id: &str, quantity: u32) {
    self
      .service
      .cart()
      .add_line(&buyer(buyer_id), &VariantRef::new(variant_id), quantity)
      .await
      .expect("adding to cart should succeed");
  }
}

/// Delegates to a `MemoryInventory`, but `try_reserve` on one variant waits
/// `delay` before answering.
pub struct SlowInventory {
  pub inner: Arc<MemoryInventory>,
  slow_variant: VariantRef,
  delay: Duration,
}

impl SlowInventory {
  pub fn new(inner: Arc<MemoryInventory>, slow_variant: &str, delay: Duration) -> Self {
    Self {
      inner,
      slow_variant: VariantRef::new(slow_variant),
      delay,
    }
  }
}

#[async_trait]
impl Inventory for SlowInventory {
  async fn get_variant(&self, variant: &VariantRef) -> StoreResult<Option<VariantRecord>> {
    self.inner.get_variant(variant).await
  }

  async fn try_reserve(&self, variant: &VariantRef, quantity: u32) -> StoreResult<bool> {
    if *variant == self.slow_variant {
      tokio::time::sleep(self.delay).await;
    }
    self.inner.try_reserve(variant, quantity).await
  }

  async fn release(&self, variant: &VariantRef, quantity: u32) -> StoreResult<()> {
    self.inner.release(variant, quantity).await
  }
}
