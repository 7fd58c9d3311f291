// server/src/web/routes.rs

use crate::state::AppState;
use crate::web::handlers::{cart_handlers, checkout_handlers, delivery_handlers, order_handlers, webhook_handlers};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Reports the store backend too, so a memory-backed instance is obvious.
async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  let database = match &app_state.db_pool {
    Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
      Ok(_) => "ok",
      Err(e) => {
        tracing::warn!(error = %e, "Health check could not reach the database.");
        return HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "database": "unreachable" }));
      }
    },
    None => "memory",
  };
  HttpResponse::Ok().json(json!({
    "status": "ok",
    "database": database,
    "simulated_gateway": app_state.config.payment_gateway.is_none(),
  }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::get_cart_handler))
          .route("", web::delete().to(cart_handlers::clear_cart_handler))
          .route("/lines", web::post().to(cart_handlers::add_line_handler))
          .route("/lines/{line_id}", web::patch().to(cart_handlers::update_line_handler))
          .route("/lines/{line_id}", web::delete().to(cart_handlers::remove_line_handler)),
      )
      .service(web::scope("/delivery").route("/quote", web::get().to(delivery_handlers::quote_handler)))
      .service(web::scope("/checkout").route("", web::post().to(checkout_handlers::start_checkout_handler)))
      .service(
        web::scope("/orders")
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/cancel", web::post().to(order_handlers::cancel_order_handler))
          .route("/{order_id}/payment/retry", web::post().to(order_handlers::retry_payment_handler))
          .route("/{order_id}/fulfilment", web::post().to(order_handlers::advance_fulfilment_handler)),
      )
      .service(web::scope("/webhooks").route("/payments", web::post().to(webhook_handlers::payment_webhook_handler))),
  );
}
