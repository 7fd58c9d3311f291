// server/src/state.rs
use crate::config::AppConfig;
use lmi_checkout::CheckoutService;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub checkout: CheckoutService,
  /// `None` when running on in-memory stores.
  pub db_pool: Option<PgPool>,
  pub config: Arc<AppConfig>,
}
