// server/src/web/extractors.rs

//! Caller identity from request headers. Authentication itself happens in
//! front of this service; these only read what the gateway forwarded.

use crate::errors::AppError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use lmi_checkout::model::{BuyerRef, StoreRef};
use tracing::warn;

pub const BUYER_HEADER: &str = "X-Buyer-Id";
pub const STORE_HEADER: &str = "X-Store-Id";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct AuthenticatedBuyer(pub BuyerRef);

impl FromRequest for AuthenticatedBuyer {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(match header_value(req, BUYER_HEADER) {
      Some(id) => Ok(AuthenticatedBuyer(BuyerRef::new(id))),
      None => {
        warn!("Missing or invalid {} header.", BUYER_HEADER);
        Err(AppError::Auth(format!("Buyer identity required ({} header).", BUYER_HEADER)))
      }
    })
  }
}

/// A store operator acting on orders that contain their products.
#[derive(Debug, Clone)]
pub struct StoreOperator(pub StoreRef);

impl FromRequest for StoreOperator {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(match header_value(req, STORE_HEADER) {
      Some(id) => Ok(StoreOperator(StoreRef::new(id))),
      None => Err(AppError::Auth(format!("Store identity required ({} header).", STORE_HEADER))),
    })
  }
}

/// The optional `Idempotency-Key` header.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl FromRequest for IdempotencyKey {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(Ok(IdempotencyKey(header_value(req, IDEMPOTENCY_HEADER))))
  }
}
