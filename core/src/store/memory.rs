// core/src/store/memory.rs

//! In-process collaborators. Used by tests and by the server when it runs
//! without a database. Each store keeps its state behind one `parking_lot`
//! lock, which is what makes `insert_order` and `try_reserve` atomic here.

use super::{
  CartSessionStore, Inventory, NotificationSink, OrderNotification, OrderStore, StoreError, StoreResult,
};
use crate::model::{BuyerRef, Cart, Order, OrderNumber, OrderState, PaymentAttempt, VariantRecord, VariantRef};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryInventory {
  variants: Mutex<HashMap<VariantRef, VariantRecord>>,
}

impl MemoryInventory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_variants(records: impl IntoIterator<Item = VariantRecord>) -> Self {
    let inventory = Self::new();
    for record in records {
      inventory.upsert(record);
    }
    inventory
  }

  pub fn upsert(&self, record: VariantRecord) {
    self.variants.lock().insert(record.variant_ref.clone(), record);
  }

  pub fn set_stock(&self, variant: &VariantRef, stock: u32) {
    if let Some(record) = self.variants.lock().get_mut(variant) {
      record.stock = stock;
    }
  }

  pub fn stock_of(&self, variant: &VariantRef) -> Option<u32> {
    self.variants.lock().get(variant).map(|r| r.stock)
  }
}

#[async_trait]
impl Inventory for MemoryInventory {
  async fn get_variant(&self, variant: &VariantRef) -> StoreResult<Option<VariantRecord>> {
    Ok(self.variants.lock().get(variant).cloned())
  }

  async fn try_reserve(&self, variant: &VariantRef, quantity: u32) -> StoreResult<bool> {
    let mut variants = self.variants.lock();
    let record = variants
      .get_mut(variant)
      .ok_or_else(|| StoreError::NotFound(format!("variant {}", variant)))?;
    if record.stock < quantity {
      return Ok(false);
    }
    record.stock -= quantity;
    Ok(true)
  }

  async fn release(&self, variant: &VariantRef, quantity: u32) -> StoreResult<()> {
    let mut variants = self.variants.lock();
    let record = variants
      .get_mut(variant)
      .ok_or_else(|| StoreError::NotFound(format!("variant {}", variant)))?;
    record.stock = record.stock.saturating_add(quantity);
    Ok(())
  }
}

#[derive(Debug, Default)]
struct OrderTables {
  orders: HashMap<Uuid, Order>,
  numbers: HashSet<OrderNumber>,
  attempts: HashMap<Uuid, PaymentAttempt>,
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
  tables: RwLock<OrderTables>,
  unavailable: AtomicBool,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// While set, every call fails with a backend error.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }

  pub fn order_ids(&self) -> Vec<Uuid> {
    self.tables.read().orders.keys().copied().collect()
  }

  fn check_available(&self) -> StoreResult<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(StoreError::Backend(anyhow::anyhow!("order store is unavailable")));
    }
    Ok(())
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn insert_order(&self, order: &Order) -> StoreResult<()> {
    self.check_available()?;
    let mut tables = self.tables.write();
    if tables.numbers.contains(&order.order_number) {
      return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
    }
    tables.numbers.insert(order.order_number.clone());
    tables.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    self.check_available()?;
    Ok(self.tables.read().orders.get(&order_id).cloned())
  }

  async fn compare_and_set_state(&self, order_id: Uuid, expected: OrderState, next: OrderState) -> StoreResult<bool> {
    self.check_available()?;
    let mut tables = self.tables.write();
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| StoreError::NotFound(format!("order {}", order_id)))?;
    if order.state() != expected {
      return Ok(false);
    }
    order.apply_state(next);
    Ok(true)
  }

  async fn save_attempt(&self, attempt: &PaymentAttempt) -> StoreResult<()> {
    self.check_available()?;
    self.tables.write().attempts.insert(attempt.id, attempt.clone());
    Ok(())
  }

  async fn find_attempt_by_reference(&self, provider_reference: &str) -> StoreResult<Option<PaymentAttempt>> {
    self.check_available()?;
    Ok(
      self
        .tables
        .read()
        .attempts
        .values()
        .find(|a| a.provider_reference.as_deref() == Some(provider_reference))
        .cloned(),
    )
  }

  async fn attempts_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentAttempt>> {
    self.check_available()?;
    let mut attempts: Vec<PaymentAttempt> = self
      .tables
      .read()
      .attempts
      .values()
      .filter(|a| a.order_id == order_id)
      .cloned()
      .collect();
    attempts.sort_by_key(|a| a.created_at);
    Ok(attempts)
  }
}

#[derive(Debug, Default)]
pub struct MemoryCartSessions {
  carts: Mutex<HashMap<BuyerRef, Cart>>,
}

impl MemoryCartSessions {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CartSessionStore for MemoryCartSessions {
  async fn load(&self, buyer: &BuyerRef) -> StoreResult<Option<Cart>> {
    Ok(self.carts.lock().get(buyer).cloned())
  }

  async fn save(&self, cart: &Cart) -> StoreResult<()> {
    self.carts.lock().insert(cart.buyer.clone(), cart.clone());
    Ok(())
  }

  async fn clear(&self, buyer: &BuyerRef) -> StoreResult<()> {
    self.carts.lock().remove(buyer);
    Ok(())
  }
}

/// Keeps every notification it is handed. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
  sent: Mutex<Vec<OrderNotification>>,
  failing: AtomicBool,
}

impl RecordingNotificationSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn sent(&self) -> Vec<OrderNotification> {
    self.sent.lock().clone()
  }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
  async fn notify(&self, notification: &OrderNotification) -> anyhow::Result<()> {
    if self.failing.load(Ordering::SeqCst) {
      anyhow::bail!("notification channel down for store {}", notification.store_ref);
    }
    self.sent.lock().push(notification.clone());
    Ok(())
  }
}
