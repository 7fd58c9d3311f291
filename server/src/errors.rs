// server/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use lmi_checkout::CheckoutError;
use serde_json::json;
use thiserror::Error;

const RETRY_MESSAGE: &str = "Could not complete checkout, please retry.";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Checkout(#[from] CheckoutError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

fn checkout_error_response(err: &CheckoutError) -> HttpResponse {
  match err {
    CheckoutError::NotAuthenticated => HttpResponse::Unauthorized().json(json!({"error": err.to_string()})),
    CheckoutError::EmptyCart | CheckoutError::Validation(_) | CheckoutError::UnknownVariant(_) => {
      HttpResponse::BadRequest().json(json!({"error": err.to_string()}))
    }
    CheckoutError::InsufficientStock {
      variant,
      requested,
      available,
    } => HttpResponse::Conflict().json(json!({
      "error": err.to_string(),
      "variant": variant,
      "requested": requested,
      "available": available,
    })),
    CheckoutError::StockConflict { variant, requested } => HttpResponse::Conflict().json(json!({
      "error": err.to_string(),
      "variant": variant,
      "requested": requested,
    })),
    CheckoutError::LineNotFound(_) | CheckoutError::OrderNotFound(_) => {
      HttpResponse::NotFound().json(json!({"error": err.to_string()}))
    }
    CheckoutError::DuplicateSubmission
    | CheckoutError::PaymentInFlight { .. }
    | CheckoutError::PaymentNotRetryable { .. }
    | CheckoutError::InvalidTransition { .. } => HttpResponse::Conflict().json(json!({"error": err.to_string()})),
    CheckoutError::AmountOverflow => HttpResponse::UnprocessableEntity().json(json!({"error": err.to_string()})),
    CheckoutError::PaymentInitiationFailed(_) => HttpResponse::BadGateway().json(json!({"error": RETRY_MESSAGE})),
    CheckoutError::OrderNumberExhausted { .. } | CheckoutError::Persistence(_) | CheckoutError::Flow(_) => {
      HttpResponse::ServiceUnavailable().json(json!({"error": RETRY_MESSAGE}))
    }
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    match self {
      AppError::Checkout(err) if err.is_caller_correctable() => {
        tracing::info!(application_error = %self, "Responding with caller error");
      }
      _ => tracing::error!(application_error = %self, "Responding with error"),
    }
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::Auth(m) => HttpResponse::Unauthorized().json(json!({"error": m})),
      AppError::Config(_) | AppError::Internal(_) => {
        HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"}))
      }
      AppError::Sqlx(_) => HttpResponse::ServiceUnavailable().json(json!({"error": RETRY_MESSAGE})),
      AppError::Checkout(err) => checkout_error_response(err),
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
