// server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpResponse};
use lmi_checkout::{CallbackDisposition, PaymentCallback};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

/// Provider callback for mobile money pushes. Anything we could parse is
/// acknowledged with 200, including unknown or already-settled references,
/// so the provider stops redelivering.
#[instrument(
  name = "handler::payment_webhook",
  skip_all,
  fields(provider_reference = %callback.provider_reference)
)]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  callback: web::Json<PaymentCallback>,
) -> Result<HttpResponse, AppError> {
  let disposition = app_state.checkout.handle_payment_callback(callback.into_inner()).await?;
  match disposition {
    CallbackDisposition::UnknownReference => warn!("Callback for unknown reference acknowledged."),
    other => info!(disposition = ?other, "Payment callback handled."),
  }
  Ok(HttpResponse::Ok().json(json!({ "status": "received", "disposition": disposition })))
}
