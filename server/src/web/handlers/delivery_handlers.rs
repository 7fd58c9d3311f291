// server/src/web/handlers/delivery_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct QuoteQuery {
  pub city: String,
}

pub async fn quote_handler(app_state: web::Data<AppState>, query: web::Query<QuoteQuery>) -> Result<HttpResponse, AppError> {
  if query.city.trim().is_empty() {
    return Err(AppError::Validation("Query parameter 'city' must not be empty.".to_string()));
  }
  Ok(HttpResponse::Ok().json(app_state.checkout.quote_delivery(&query.city)))
}
