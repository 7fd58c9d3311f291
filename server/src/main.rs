// server/src/main.rs

mod config;
mod db;
mod errors;
mod models;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat, StoreBackend};
use crate::errors::AppError;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use lmi_checkout::model::{Money, StoreRef, VariantRecord, VariantRef};
use lmi_checkout::orders::RandomOrderNumbers;
use lmi_checkout::payment::{PaymentGateway, SimulatedGateway};
use lmi_checkout::store::memory::{MemoryCartSessions, MemoryInventory, MemoryOrderStore, RecordingNotificationSink};
use lmi_checkout::{CheckoutService, Collaborators};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn payment_gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>, AppError> {
  match &config.payment_gateway {
    Some(gateway) => Ok(Arc::new(services::HttpMobileMoneyGateway::new(gateway)?)),
    None => {
      tracing::warn!("PAYMENT_GATEWAY_URL not set; mobile money pushes go to the simulated gateway.");
      Ok(Arc::new(SimulatedGateway::new()))
    }
  }
}

fn demo_catalog() -> Vec<VariantRecord> {
  [
    ("capulana-azul-m", "loja-maputo", "Capulana azul (M)", 850, 40),
    ("capulana-azul-g", "loja-maputo", "Capulana azul (G)", 900, 25),
    ("cesto-palha", "artesanato-beira", "Cesto de palha", 1_200, 10),
    ("cafe-niassa-250g", "sabores-do-norte", "Cafe do Niassa 250g", 450, 60),
  ]
  .into_iter()
  .map(|(variant, store, name, price, stock)| VariantRecord {
    variant_ref: VariantRef::new(variant),
    store_ref: StoreRef::new(store),
    product_name: name.to_string(),
    price: Money::new(price),
    stock,
  })
  .collect()
}

async fn build_collaborators(config: &AppConfig) -> Result<(Collaborators, Option<PgPool>), AppError> {
  let gateway = payment_gateway(config)?;
  let order_numbers = Arc::new(RandomOrderNumbers);

  match config.store_backend {
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is required for the postgres backend".to_string()))?;
      let pool = PgPool::connect(url).await?;
      tracing::info!("Successfully connected to the database.");
      if config.run_migrations {
        db::run_migrations(&pool).await?;
      }
      let collaborators = Collaborators {
        inventory: Arc::new(db::PgInventory::new(pool.clone())),
        orders: Arc::new(db::PgOrderStore::new(pool.clone())),
        carts: Arc::new(db::PgCartSessions::new(pool.clone())),
        notifications: Arc::new(db::PgNotificationSink::new(pool.clone())),
        gateway,
        order_numbers,
      };
      Ok((collaborators, Some(pool)))
    }
    StoreBackend::Memory => {
      tracing::warn!("Running on in-memory stores; nothing survives a restart.");
      let inventory = if config.seed_demo_catalog {
        MemoryInventory::with_variants(demo_catalog())
      } else {
        MemoryInventory::new()
      };
      let collaborators = Collaborators {
        inventory: Arc::new(inventory),
        orders: Arc::new(MemoryOrderStore::new()),
        carts: Arc::new(MemoryCartSessions::new()),
        notifications: Arc::new(RecordingNotificationSink::new()),
        gateway,
        order_numbers,
      };
      Ok((collaborators, None))
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      // No subscriber yet.
      eprintln!("Configuration error: {}", e);
      std::process::exit(1);
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!("Starting checkout server...");

  let (collaborators, db_pool) = match build_collaborators(&app_config).await {
    Ok(built) => built,
    Err(e) => {
      tracing::error!(error = %e, "Failed to set up checkout collaborators.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };

  let app_state = AppState {
    checkout: CheckoutService::new(collaborators, app_config.checkout.clone()),
    db_pool,
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
