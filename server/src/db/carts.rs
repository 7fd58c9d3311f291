// server/src/db/carts.rs

use super::backend;
use async_trait::async_trait;
use lmi_checkout::model::{BuyerRef, Cart};
use lmi_checkout::store::StoreResult;
use lmi_checkout::CartSessionStore;
use sqlx::types::Json;
use sqlx::PgPool;

/// One JSONB document per buyer.
#[derive(Clone)]
pub struct PgCartSessions {
  pool: PgPool,
}

impl PgCartSessions {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CartSessionStore for PgCartSessions {
  async fn load(&self, buyer: &BuyerRef) -> StoreResult<Option<Cart>> {
    let cart = sqlx::query_scalar::<_, Json<Cart>>("SELECT cart FROM cart_sessions WHERE buyer_ref = $1")
      .bind(buyer.as_str())
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    Ok(cart.map(|c| c.0))
  }

  async fn save(&self, cart: &Cart) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO cart_sessions (buyer_ref, cart, updated_at) VALUES ($1, $2, now()) \
       ON CONFLICT (buyer_ref) DO UPDATE SET cart = EXCLUDED.cart, updated_at = now()",
    )
    .bind(cart.buyer.as_str())
    .bind(Json(cart))
    .execute(&self.pool)
    .await
    .map_err(backend)?;
    Ok(())
  }

  async fn clear(&self, buyer: &BuyerRef) -> StoreResult<()> {
    sqlx::query("DELETE FROM cart_sessions WHERE buyer_ref = $1")
      .bind(buyer.as_str())
      .execute(&self.pool)
      .await
      .map_err(backend)?;
    Ok(())
  }
}
