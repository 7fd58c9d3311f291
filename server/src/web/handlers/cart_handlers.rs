// server/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use lmi_checkout::model::{Cart, VariantRef};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedBuyer;

#[derive(Deserialize, Debug)]
pub struct AddLinePayload {
  pub variant_ref: String,
  pub quantity: u32,
}

#[derive(Deserialize, Debug)]
pub struct UpdateLinePayload {
  /// Zero or negative removes the line.
  pub quantity: i64,
}

fn cart_response(cart: &Cart) -> Result<HttpResponse, AppError> {
  let subtotal = cart.subtotal()?;
  Ok(HttpResponse::Ok().json(json!({
    "cart": cart,
    "subtotal": subtotal,
  })))
}

#[instrument(name = "handler::get_cart", skip_all, fields(buyer = %buyer.0))]
pub async fn get_cart_handler(app_state: web::Data<AppState>, buyer: AuthenticatedBuyer) -> Result<HttpResponse, AppError> {
  let cart = app_state.checkout.cart().cart(&buyer.0).await?;
  cart_response(&cart)
}

#[instrument(
  name = "handler::add_cart_line",
  skip_all,
  fields(buyer = %buyer.0, variant = %payload.variant_ref, quantity = payload.quantity)
)]
pub async fn add_line_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddLinePayload>,
  buyer: AuthenticatedBuyer,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let cart = app_state
    .checkout
    .cart()
    .add_line(&buyer.0, &VariantRef::new(payload.variant_ref), payload.quantity)
    .await?;
  info!(lines = cart.lines.len(), "Cart line added.");
  cart_response(&cart)
}

#[instrument(name = "handler::update_cart_line", skip_all, fields(buyer = %buyer.0, line_id = %line_id))]
pub async fn update_line_handler(
  app_state: web::Data<AppState>,
  line_id: web::Path<Uuid>,
  payload: web::Json<UpdateLinePayload>,
  buyer: AuthenticatedBuyer,
) -> Result<HttpResponse, AppError> {
  let cart = app_state
    .checkout
    .cart()
    .update_quantity(&buyer.0, line_id.into_inner(), payload.quantity)
    .await?;
  cart_response(&cart)
}

#[instrument(name = "handler::remove_cart_line", skip_all, fields(buyer = %buyer.0, line_id = %line_id))]
pub async fn remove_line_handler(
  app_state: web::Data<AppState>,
  line_id: web::Path<Uuid>,
  buyer: AuthenticatedBuyer,
) -> Result<HttpResponse, AppError> {
  let cart = app_state
    .checkout
    .cart()
    .remove_line(&buyer.0, line_id.into_inner())
    .await?;
  cart_response(&cart)
}

#[instrument(name = "handler::clear_cart", skip_all, fields(buyer = %buyer.0))]
pub async fn clear_cart_handler(app_state: web::Data<AppState>, buyer: AuthenticatedBuyer) -> Result<HttpResponse, AppError> {
  app_state.checkout.cart().clear(&buyer.0).await?;
  Ok(HttpResponse::NoContent().finish())
}
