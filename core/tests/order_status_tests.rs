// tests/order_status_tests.rs
mod common;

use common::*;
use lmi_checkout::model::{OrderStatus, PaymentMethod, PaymentStatus};
use lmi_checkout::{CancelActor, CheckoutError};

fn harness() -> Harness {
  Harness::new(vec![variant("v1", STORE_A, 1_000, 5), variant("v2", STORE_B, 250, 5)])
}

#[tokio::test(start_paused = true)]
async fn test_cash_on_delivery_runs_full_fulfilment() {
  setup_tracing();
  let h = harness();
  h.fill_cart("buyer-1", "v1", 1).await;
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::CashOnDelivery, "Maputo"))
    .await
    .unwrap();
  assert_eq!(receipt.order.order_status, OrderStatus::Confirmed);
  assert_eq!(receipt.order.payment_status, PaymentStatus::AwaitingPayment);

  let shipped = h
    .service
    .advance_fulfilment(receipt.order.id, OrderStatus::Shipped)
    .await
    .unwrap();
  assert_eq!(shipped.order_status, OrderStatus::Shipped);

  let delivered = h
    .service
    .advance_fulfilment(receipt.order.id, OrderStatus::Delivered)
    .await
    .unwrap();
  assert_eq!(delivered.order_status, OrderStatus::Delivered);

  // Delivered is final.
  assert!(matches!(
    h.service.cancel_order(receipt.order.id, CancelActor::Store).await,
    Err(CheckoutError::InvalidTransition { .. })
  ));
}

#[tokio::test(start_paused = true)]
async fn test_unpaid_order_cannot_ship() {
  setup_tracing();
  let h = harness();
  h.fill_cart("buyer-1", "v1", 1).await;
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Beira"))
    .await
    .unwrap();
  assert_eq!(receipt.order.order_status, OrderStatus::Pending);

  let err = h
    .service
    .advance_fulfilment(receipt.order.id, OrderStatus::Shipped)
    .await
    .unwrap_err();
  match err {
    CheckoutError::InvalidTransition { from, to } => {
      assert_eq!(from, "pending");
      assert_eq!(to, "shipped");
    }
    other => panic!("expected InvalidTransition, got {:?}", other),
  }

  assert!(matches!(
    h.service.advance_fulfilment(receipt.order.id, OrderStatus::Cancelled).await,
    Err(CheckoutError::Validation(_))
  ));
  assert!(matches!(
    h.service.advance_fulfilment(receipt.order.id, OrderStatus::Confirmed).await,
    Err(CheckoutError::Validation(_))
  ));
}

#[tokio::test(start_paused = true)]
async fn test_shipped_order_cannot_be_cancelled() {
  setup_tracing();
  let h = harness();
  h.fill_cart("buyer-1", "v1", 2).await;
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::CashOnDelivery, "Maputo"))
    .await
    .unwrap();
  h.service
    .advance_fulfilment(receipt.order.id, OrderStatus::Shipped)
    .await
    .unwrap();

  assert!(matches!(
    h.service
      .cancel_order(receipt.order.id, CancelActor::Buyer(buyer("buyer-1")))
      .await,
    Err(CheckoutError::InvalidTransition { .. })
  ));
  // Stock stays with the shipped order.
  assert_eq!(h.stock("v1"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_twice_releases_stock_once() {
  setup_tracing();
  let h = harness();
  h.fill_cart("buyer-1", "v1", 2).await;
  h.fill_cart("buyer-1", "v2", 3).await;
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::BankTransfer, "Nampula"))
    .await
    .unwrap();
  assert_eq!((h.stock("v1"), h.stock("v2")), (3, 2));

  let first = h
    .service
    .cancel_order(receipt.order.id, CancelActor::Buyer(buyer("buyer-1")))
    .await
    .unwrap();
  assert_eq!(first.order_status, OrderStatus::Cancelled);
  let second = h.service.cancel_order(receipt.order.id, CancelActor::Store).await.unwrap();
  assert_eq!(second.order_status, OrderStatus::Cancelled);

  assert_eq!((h.stock("v1"), h.stock("v2")), (5, 5));
}

#[tokio::test(start_paused = true)]
async fn test_buyer_cannot_cancel_someone_elses_order() {
  setup_tracing();
  let h = harness();
  h.fill_cart("buyer-1", "v1", 1).await;
  let receipt = h
    .service
    .checkout(checkout_request("buyer-1", PaymentMethod::CashOnDelivery, "Maputo"))
    .await
    .unwrap();

  assert!(matches!(
    h.service
      .cancel_order(receipt.order.id, CancelActor::Buyer(buyer("buyer-2")))
      .await,
    Err(CheckoutError::OrderNotFound(_))
  ));
  let view = h.service.order_view(None, receipt.order.id).await.unwrap();
  assert_eq!(view.order.order_status, OrderStatus::Confirmed);
}
