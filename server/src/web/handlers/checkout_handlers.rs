// server/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use lmi_checkout::model::{PaymentMethod, ShippingAddress};
use lmi_checkout::{CheckoutRequest, PaymentStep};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{AuthenticatedBuyer, IdempotencyKey};

#[derive(Deserialize, Debug)]
pub struct CheckoutPayload {
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  /// Mobile money number; required for `mobile_money`.
  pub payment_contact: Option<String>,
}

#[instrument(
  name = "handler::checkout",
  skip_all,
  fields(buyer = ?buyer.as_ref().map(|b| b.0.to_string()), method = %payload.payment_method, idempotency_key = ?idempotency_key.0)
)]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutPayload>,
  buyer: Option<AuthenticatedBuyer>,
  idempotency_key: IdempotencyKey,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let receipt = app_state
    .checkout
    .checkout(CheckoutRequest {
      buyer: buyer.map(|b| b.0),
      shipping_address: payload.shipping_address,
      payment_method: payload.payment_method,
      payment_contact: payload.payment_contact,
      idempotency_key: idempotency_key.0,
    })
    .await?;

  let mut response = match &receipt.payment {
    PaymentStep::Replayed => {
      info!(order_id = %receipt.order.id, "Checkout replayed existing order.");
      HttpResponse::Ok()
    }
    PaymentStep::InitiationFailed { reason } => {
      warn!(order_id = %receipt.order.id, reason = %reason, "Order created but payment could not be started.");
      HttpResponse::Created()
    }
    _ => {
      info!(order_id = %receipt.order.id, order_number = %receipt.order.order_number, "Checkout completed.");
      HttpResponse::Created()
    }
  };
  Ok(response.json(json!({
    "order": receipt.order,
    "payment": receipt.payment,
  })))
}
