// tests/order_creation_tests.rs
mod common;

use common::*;
use lmi_checkout::model::{Money, OrderStatus, PaymentMethod, PaymentStatus, VariantRef};
use lmi_checkout::orders::{OrderOrchestrator, OrderRequest, RandomOrderNumbers};
use lmi_checkout::store::memory::{MemoryCartSessions, MemoryInventory, MemoryOrderStore, RecordingNotificationSink};
use lmi_checkout::store::NotificationKind;
use lmi_checkout::payment::SimulatedGateway;
use lmi_checkout::{CartLedger, CheckoutError, CheckoutService, Collaborators, PaymentStep};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_scenario_a_totals_and_state() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.fill_cart("buyer-1", "v1", 2).await;

  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();
  let order = receipt.order;

  assert_eq!(order.subtotal, Money::new(1000));
  assert_eq!(order.shipping_fee, Money::new(150));
  assert_eq!(order.total, Money::new(1150));
  assert!(order.totals_consistent());
  assert_eq!(order.lines.len(), 1);
  assert_eq!(order.lines[0].unit_price, Money::new(500));
  assert_eq!(order.lines[0].subtotal, Money::new(1000));
  assert_eq!(order.order_status, OrderStatus::Pending);
  assert_eq!(order.payment_status, PaymentStatus::AwaitingPayment);
  assert_eq!(
    order.estimated_delivery,
    order.created_at.date_naive() + chrono::Days::new(2)
  );

  let number = order.order_number.as_str();
  assert!(number.starts_with(&format!("LMI-{}-", order.created_at.format("%Y%m%d"))));
  assert_eq!(number.len(), "LMI-YYYYMMDD-XXXX".len());

  // Reserved at creation, cart gone, owner told.
  assert_eq!(h.stock("v1"), 8);
  assert!(h.service.cart().cart(&buyer("buyer-1")).await.unwrap().is_empty());
  let sent = h.notifications.sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].store_ref.as_str(), STORE_A);
  assert_eq!(sent[0].kind, NotificationKind::NewOrder);
  assert_eq!(sent[0].order_id, order.id);

  match receipt.payment {
    PaymentStep::Immediate { .. } => {}
    other => panic!("bank transfer should be immediate, got {:?}", other),
  }
}

#[tokio::test]
async fn test_order_body_exposes_only_order_data() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.fill_cart("buyer-1", "v1", 1).await;
  let order = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap()
    .order;

  let body = serde_json::to_value(&order).unwrap();
  let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
  for expected in ["id", "order_number", "lines", "subtotal", "shipping_fee", "total", "order_status", "payment_status"] {
    assert!(keys.contains(&expected), "missing {} in {:?}", expected, keys);
  }
  assert!(!keys.contains(&"internal_flags"));
  assert_eq!(body["total"], serde_json::json!(650));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_scenario_b_last_unit_is_sold_once() {
  setup_tracing();
  let h = Harness::new(vec![variant("last", STORE_A, 700, 1)]);
  h.fill_cart("buyer-1", "last", 1).await;
  h.fill_cart("buyer-2", "last", 1).await;

  let (svc1, svc2) = (h.service.clone(), h.service.clone());
  let first = tokio::spawn(async move {
    svc1
      .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Beira"))
      .await
  });
  let second = tokio::spawn(async move {
    svc2
      .checkout(checkout_request("buyer-2", PaymentMethod::BankTransfer, "Beira"))
      .await
  });
  let results = [first.await.unwrap(), second.await.unwrap()];

  let successes = results.iter().filter(|r| r.is_ok()).count();
  let conflicts = results
    .iter()
    .filter(|r| matches!(r, Err(CheckoutError::StockConflict { variant, requested: 1 }) if variant.as_str() == "last"))
    .count();
  assert_eq!(successes, 1);
  assert_eq!(conflicts, 1);
  assert_eq!(h.orders.order_count(), 1);
  assert_eq!(h.stock("last"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_checkouts_never_oversell() {
  setup_tracing();
  let h = Harness::new(vec![variant("hot", STORE_A, 100, 5)]);
  for i in 0..12 {
    h.fill_cart(&format!("buyer-{}", i), "hot", 1).await;
  }

  let handles: Vec<_> = (0..12)
    .map(|i| {
      let svc = h.service.clone();
      tokio::spawn(async move {
        svc
          .checkout(checkout_request(&format!("buyer-{}", i), PaymentMethod::CashOnDelivery, "Tete"))
          .await
      })
    })
    .collect();

  let mut placed = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => placed += 1,
      Err(CheckoutError::StockConflict { .. }) => {}
      Err(other) => panic!("unexpected error: {}", other),
    }
  }
  assert_eq!(placed, 5);
  assert_eq!(h.orders.order_count(), 5);
  assert_eq!(h.stock("hot"), 0);
}

#[tokio::test]
async fn test_order_number_collision_is_retried() {
  setup_tracing();
  let h = Harness::with(
    vec![variant("v1", STORE_A, 500, 10)],
    test_config(),
    Arc::new(ScriptedOrderNumbers::new(&[7, 7, 8])),
  );

  h.fill_cart("buyer-1", "v1", 1).await;
  let first = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();
  h.fill_cart("buyer-2", "v1", 1).await;
  let second = h
    .service
    .checkout(checkout_request("buyer-2", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();

  assert!(first.order.order_number.as_str().ends_with("-0007"));
  assert!(second.order.order_number.as_str().ends_with("-0008"));
  assert_ne!(first.order.order_number, second.order.order_number);
}

#[tokio::test]
async fn test_order_number_exhaustion_releases_everything() {
  setup_tracing();
  let mut config = test_config();
  config.order_number_max_attempts = 3;
  let h = Harness::with(
    vec![variant("v1", STORE_A, 500, 10)],
    config,
    Arc::new(ScriptedOrderNumbers::new(&[5])),
  );

  h.fill_cart("buyer-1", "v1", 1).await;
  h.service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();

  h.fill_cart("buyer-2", "v1", 4).await;
  let err = h
    .service
    .checkout(checkout_request("buyer-2", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap_err();

  assert!(matches!(err, CheckoutError::OrderNumberExhausted { attempts: 3 }));
  assert!(!err.is_caller_correctable());
  assert_eq!(h.stock("v1"), 9);
  assert_eq!(h.orders.order_count(), 1);
  // Cart kept so the buyer can simply try again.
  assert_eq!(h.service.cart().cart(&buyer("buyer-2")).await.unwrap().lines[0].quantity, 4);
}

#[tokio::test]
async fn test_persistence_failure_leaves_no_trace() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10), variant("v2", STORE_B, 300, 10)]);
  h.fill_cart("buyer-1", "v1", 2).await;
  h.fill_cart("buyer-1", "v2", 3).await;

  h.orders.set_unavailable(true);
  let err = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap_err();
  assert!(matches!(err, CheckoutError::Persistence(_)));
  assert_eq!(h.stock("v1"), 10);
  assert_eq!(h.stock("v2"), 10);
  assert!(h.notifications.sent().is_empty());

  // The dedupe claim was released too: the same cart goes through once the store is back.
  h.orders.set_unavailable(false);
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();
  assert_eq!(receipt.order.lines.len(), 2);
  assert_eq!(h.stock("v1"), 8);
  assert_eq!(h.stock("v2"), 7);
}

#[tokio::test]
async fn test_partial_reservation_is_rolled_back() {
  setup_tracing();
  let h = Harness::new(vec![variant("a", STORE_A, 100, 5), variant("b", STORE_A, 100, 5)]);
  h.fill_cart("buyer-1", "a", 2).await;
  h.fill_cart("buyer-1", "b", 2).await;
  // Someone else bought most of "b" after it went into the cart.
  h.inventory.set_stock(&VariantRef::new("b"), 1);

  let err = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap_err();

  assert!(matches!(err, CheckoutError::StockConflict { ref variant, requested: 2 } if variant.as_str() == "b"));
  assert!(err.is_caller_correctable());
  assert_eq!(h.stock("a"), 5);
  assert_eq!(h.stock("b"), 1);
  assert_eq!(h.orders.order_count(), 0);
}

#[tokio::test]
async fn test_one_notification_per_store() {
  setup_tracing();
  let h = Harness::new(vec![
    variant("a1", STORE_A, 100, 5),
    variant("b1", STORE_B, 200, 5),
    variant("a2", STORE_A, 300, 5),
  ]);
  h.fill_cart("buyer-1", "a1", 1).await;
  h.fill_cart("buyer-1", "b1", 1).await;
  h.fill_cart("buyer-1", "a2", 2).await;

  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Nampula"))
    .await
    .unwrap();

  let mut stores: Vec<String> = h.notifications.sent().iter().map(|n| n.store_ref.to_string()).collect();
  stores.sort();
  assert_eq!(stores, vec![STORE_A.to_string(), STORE_B.to_string()]);
  assert_eq!(receipt.order.subtotal, Money::new(900));
  assert_eq!(receipt.order.total, Money::new(1350));
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_checkout() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.notifications.set_failing(true);
  h.fill_cart("buyer-1", "v1", 1).await;

  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Matola"))
    .await
    .unwrap();

  assert_eq!(receipt.order.total, Money::new(700));
  assert!(h.notifications.sent().is_empty());
  assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_any_write() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.fill_cart("buyer-1", "v1", 1).await;

  let mut anonymous = checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo");
  anonymous.buyer = None;
  assert!(matches!(
    h.service.checkout(anonymous).await,
    Err(CheckoutError::NotAuthenticated)
  ));

  let no_city = checkout_request("buyer-1", PaymentMethod::BankTransfer, "  ");
  assert!(matches!(h.service.checkout(no_city).await, Err(CheckoutError::Validation(_))));

  let mut no_street = checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo");
  no_street.shipping_address.street = String::new();
  assert!(matches!(h.service.checkout(no_street).await, Err(CheckoutError::Validation(_))));

  let mut bad_phone = checkout_request("buyer-1", PaymentMethod::MobileMoney, "Maputo");
  bad_phone.payment_contact = Some("+258 21 123 456".to_string());
  assert!(matches!(h.service.checkout(bad_phone).await, Err(CheckoutError::Validation(_))));

  let empty = checkout_request("buyer-without-cart", PaymentMethod::BankTransfer, "Maputo");
  assert!(matches!(h.service.checkout(empty).await, Err(CheckoutError::EmptyCart)));

  assert_eq!(h.stock("v1"), 10);
  assert_eq!(h.orders.order_count(), 0);
  assert!(h.gateway.pushes().is_empty());
}

#[tokio::test]
async fn test_idempotency_key_replays_the_first_order() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.fill_cart("buyer-1", "v1", 1).await;

  let mut request = checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo");
  request.idempotency_key = Some("tap-1".to_string());
  let first = h.service.checkout(request.clone()).await.unwrap();
  let again = h.service.checkout(request).await.unwrap();

  assert_eq!(again.order.id, first.order.id);
  assert_eq!(again.payment, PaymentStep::Replayed);
  assert_eq!(h.orders.order_count(), 1);
  assert_eq!(h.stock("v1"), 9);
}

#[tokio::test]
async fn test_same_cart_snapshot_is_deduped() {
  setup_tracing();
  let inventory = Arc::new(MemoryInventory::with_variants(vec![variant("v1", STORE_A, 500, 10)]));
  let orders = Arc::new(MemoryOrderStore::new());
  let ledger = CartLedger::new(inventory.clone(), Arc::new(MemoryCartSessions::new()));
  let orchestrator = OrderOrchestrator::new(
    inventory.clone(),
    orders.clone(),
    Arc::new(RecordingNotificationSink::new()),
    Arc::new(lmi_checkout::orders::RandomOrderNumbers),
    &test_config(),
  );
  assert_eq!(
    orchestrator.step_names(),
    vec![
      "validate_request",
      "claim_submission",
      "reserve_stock",
      "price_order",
      "persist_order",
      "notify_store_owners"
    ]
  );

  let b = buyer("buyer-1");
  ledger.add_line(&b, &VariantRef::new("v1"), 3).await.unwrap();
  let snapshot = ledger.snapshot_for_checkout(&b).await.unwrap();
  let request = OrderRequest {
    buyer: Some(b.clone()),
    cart: snapshot,
    shipping_address: address("Pemba"),
    payment_method: PaymentMethod::CashOnDelivery,
    payment_contact: None,
    idempotency_key: None,
  };

  let first = orchestrator.place_order(request.clone()).await.unwrap();
  let second = orchestrator.place_order(request).await.unwrap();

  assert!(!first.replayed);
  assert!(second.replayed);
  assert_eq!(first.order.id, second.order.id);
  assert_eq!(first.order.shipping_fee, Money::new(500));
  assert_eq!(inventory.stock_of(&VariantRef::new("v1")), Some(7));
  assert_eq!(orders.order_count(), 1);
}

#[tokio::test]
async fn test_cash_on_delivery_confirms_immediately() {
  setup_tracing();
  let h = Harness::new(vec![variant("v1", STORE_A, 500, 10)]);
  h.fill_cart("buyer-1", "v1", 1).await;

  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::CashOnDelivery, "Chimoio"))
    .await
    .unwrap();

  assert_eq!(receipt.order.order_status, OrderStatus::Confirmed);
  assert_eq!(receipt.order.payment_status, PaymentStatus::AwaitingPayment);
  assert!(matches!(receipt.payment, PaymentStep::Immediate { .. }));
}

#[allow(dead_code)]
fn assert_service_is_send_and_sync() {
  fn is_send_sync<T: Send + Sync>() {}
  is_send_sync::<CheckoutService>();
}

/// A service whose reservation of "slow" takes five seconds.
fn service_with_slow_reservation(inner: Arc<MemoryInventory>, orders: Arc<MemoryOrderStore>) -> CheckoutService {
  CheckoutService::new(
    Collaborators {
      inventory: Arc::new(SlowInventory::new(inner, "slow", Duration::from_secs(5))),
      orders,
      carts: Arc::new(MemoryCartSessions::new()),
      notifications: Arc::new(RecordingNotificationSink::new()),
      gateway: Arc::new(SimulatedGateway::new()),
      order_numbers: Arc::new(RandomOrderNumbers),
    },
    test_config(),
  )
}

/// Starts a checkout for `buyer_id` and drops it while "slow" is being reserved.
async fn abandon_checkout_mid_reservation(service: &CheckoutService, buyer_id: &str) {
  let caller = tokio::spawn({
    let service = service.clone();
    let request = checkout_request(buyer_id, PaymentMethod::BankTransfer, "Maputo");
    async move { service.checkout(request).await }
  });
  tokio::time::sleep(Duration::from_millis(10)).await;
  caller.abort();
  assert!(caller.await.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_checkout_still_completes_its_order() {
  setup_tracing();
  let inner = Arc::new(MemoryInventory::with_variants(vec![
    variant("a-fast", STORE_A, 100, 10),
    variant("slow", STORE_B, 100, 10),
  ]));
  let orders = Arc::new(MemoryOrderStore::new());
  let service = service_with_slow_reservation(inner.clone(), orders.clone());
  let buyer_ref = buyer("buyer-1");
  service.cart().add_line(&buyer_ref, &VariantRef::new("a-fast"), 2).await.unwrap();
  service.cart().add_line(&buyer_ref, &VariantRef::new("slow"), 1).await.unwrap();

  abandon_checkout_mid_reservation(&service, "buyer-1").await;
  tokio::time::sleep(Duration::from_secs(10)).await;

  // Every reservation is backed by the order that was created.
  assert_eq!(orders.order_count(), 1);
  assert_eq!(inner.stock_of(&VariantRef::new("a-fast")), Some(8));
  assert_eq!(inner.stock_of(&VariantRef::new("slow")), Some(9));

  let receipt = service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap();
  assert_eq!(receipt.payment, PaymentStep::Replayed);
  assert_eq!(orders.order_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_checkout_that_fails_releases_stock_and_claim() {
  setup_tracing();
  let inner = Arc::new(MemoryInventory::with_variants(vec![
    variant("a-fast", STORE_A, 100, 10),
    variant("slow", STORE_B, 100, 10),
  ]));
  let orders = Arc::new(MemoryOrderStore::new());
  let service = service_with_slow_reservation(inner.clone(), orders.clone());
  let buyer_ref = buyer("buyer-1");
  service.cart().add_line(&buyer_ref, &VariantRef::new("a-fast"), 2).await.unwrap();
  service.cart().add_line(&buyer_ref, &VariantRef::new("slow"), 1).await.unwrap();
  inner.set_stock(&VariantRef::new("slow"), 0);

  abandon_checkout_mid_reservation(&service, "buyer-1").await;
  tokio::time::sleep(Duration::from_secs(10)).await;

  assert_eq!(orders.order_count(), 0);
  assert_eq!(inner.stock_of(&VariantRef::new("a-fast")), Some(10));

  // The claim went with the failed run: the retry is judged on stock, not as a duplicate.
  let err = service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Maputo"))
    .await
    .unwrap_err();
  assert!(matches!(err, CheckoutError::StockConflict { .. }), "got {:?}", err);
  assert_eq!(inner.stock_of(&VariantRef::new("a-fast")), Some(10));
}
