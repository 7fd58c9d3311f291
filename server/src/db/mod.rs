// server/src/db/mod.rs

//! Postgres implementations of the checkout core's collaborator traits.

pub mod carts;
pub mod inventory;
pub mod notifications;
pub mod orders;

pub use carts::PgCartSessions;
pub use inventory::PgInventory;
pub use notifications::PgNotificationSink;
pub use orders::PgOrderStore;

use lmi_checkout::StoreError;
use sqlx::PgPool;
use tracing::{info, instrument};

const SCHEMA: &str = include_str!("../../schema.sql");

fn backend(err: sqlx::Error) -> StoreError {
  StoreError::Backend(err.into())
}

#[instrument(name = "db::run_migrations", skip(pool), err)]
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
  sqlx::raw_sql(SCHEMA).execute(pool).await?;
  info!("Checkout schema is up to date.");
  Ok(())
}
