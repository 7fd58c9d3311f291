// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use lmi_checkout::model::OrderStatus;
use lmi_checkout::{CancelActor, CheckoutError};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{AuthenticatedBuyer, StoreOperator};

#[derive(Deserialize, Debug, Default)]
pub struct RetryPaymentPayload {
  pub payment_contact: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FulfilmentPayload {
  pub status: OrderStatus,
}

#[instrument(name = "handler::get_order", skip_all, fields(buyer = %buyer.0, order_id = %order_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  buyer: AuthenticatedBuyer,
) -> Result<HttpResponse, AppError> {
  let view = app_state.checkout.order_view(Some(&buyer.0), order_id.into_inner()).await?;
  Ok(HttpResponse::Ok().json(view))
}

/// Buyers cancel their own orders; store operators cancel orders holding their products.
#[instrument(name = "handler::cancel_order", skip_all, fields(order_id = %order_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  buyer: Option<AuthenticatedBuyer>,
  store: Option<StoreOperator>,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  let actor = match (buyer, store) {
    (Some(buyer), _) => CancelActor::Buyer(buyer.0),
    (None, Some(store)) => {
      ensure_store_owns(&app_state, &store, order_id).await?;
      CancelActor::Store
    }
    (None, None) => return Err(AppError::Auth("Buyer or store identity required.".to_string())),
  };
  let order = app_state.checkout.cancel_order(order_id, actor).await?;
  info!(order_status = %order.order_status, "Cancel request handled.");
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(name = "handler::retry_payment", skip_all, fields(buyer = %buyer.0, order_id = %order_id))]
pub async fn retry_payment_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  payload: Option<web::Json<RetryPaymentPayload>>,
  buyer: AuthenticatedBuyer,
) -> Result<HttpResponse, AppError> {
  let payload = payload.map(web::Json::into_inner).unwrap_or_default();
  let receipt = app_state
    .checkout
    .retry_payment(&buyer.0, order_id.into_inner(), payload.payment_contact.as_deref())
    .await?;
  Ok(HttpResponse::Accepted().json(json!({
    "order": receipt.order,
    "payment": receipt.payment,
  })))
}

#[instrument(name = "handler::advance_fulfilment", skip_all, fields(store = %store.0, order_id = %order_id, to = %payload.status))]
pub async fn advance_fulfilment_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  payload: web::Json<FulfilmentPayload>,
  store: StoreOperator,
) -> Result<HttpResponse, AppError> {
  let order_id = order_id.into_inner();
  ensure_store_owns(&app_state, &store, order_id).await?;
  let order = app_state.checkout.advance_fulfilment(order_id, payload.status).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

/// Orders without the operator's products are reported as missing.
async fn ensure_store_owns(app_state: &AppState, store: &StoreOperator, order_id: Uuid) -> Result<(), AppError> {
  let view = app_state.checkout.order_view(None, order_id).await?;
  if view.order.stores().contains(&store.0) {
    Ok(())
  } else {
    Err(CheckoutError::OrderNotFound(order_id).into())
  }
}
