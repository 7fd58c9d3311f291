// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use lmi_checkout::{BankTransferDetails, CheckoutConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  /// In-process stores; everything is lost on restart.
  Memory,
}

impl FromStr for StoreBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "pg" => Ok(StoreBackend::Postgres),
      "memory" => Ok(StoreBackend::Memory),
      other => Err(AppError::Config(format!("Invalid STORE_BACKEND '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct PaymentGatewayConfig {
  pub base_url: String,
  pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  /// Loads a small demo catalog into the in-memory inventory.
  pub seed_demo_catalog: bool,
  /// `None` runs against the simulated gateway.
  pub payment_gateway: Option<PaymentGatewayConfig>,
  pub log_format: LogFormat,
  pub checkout: CheckoutConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_var("SERVER_PORT", get_env("SERVER_PORT"), 8080u16)?;

    let store_backend = match get_env("STORE_BACKEND") {
      Some(raw) => raw.parse::<StoreBackend>()?,
      None => StoreBackend::Postgres,
    };
    let database_url = get_env("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (or set STORE_BACKEND=memory)".to_string(),
      ));
    }
    let run_migrations = parse_var("RUN_MIGRATIONS", get_env("RUN_MIGRATIONS"), false)?;
    let seed_demo_catalog = parse_var("SEED_DEMO_CATALOG", get_env("SEED_DEMO_CATALOG"), false)?;

    let payment_gateway = match (get_env("PAYMENT_GATEWAY_URL"), get_env("PAYMENT_GATEWAY_API_KEY")) {
      (Some(base_url), Some(api_key)) => Some(PaymentGatewayConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
      }),
      (Some(_), None) => {
        return Err(AppError::Config(
          "PAYMENT_GATEWAY_URL is set but PAYMENT_GATEWAY_API_KEY is missing".to_string(),
        ))
      }
      (None, _) => None,
    };

    let log_format = match get_env("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
      Some("json") => LogFormat::Json,
      Some("pretty") | None => LogFormat::Pretty,
      Some(other) => return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    };

    let defaults = CheckoutConfig::default();
    let defaults_bank = BankTransferDetails::default();
    let checkout = CheckoutConfig {
      payment_poll_interval: Duration::from_millis(parse_var(
        "PAYMENT_POLL_INTERVAL_MS",
        get_env("PAYMENT_POLL_INTERVAL_MS"),
        defaults.payment_poll_interval.as_millis() as u64,
      )?),
      payment_max_wait: Duration::from_secs(parse_var(
        "PAYMENT_MAX_WAIT_SECS",
        get_env("PAYMENT_MAX_WAIT_SECS"),
        defaults.payment_max_wait.as_secs(),
      )?),
      dedupe_window: Duration::from_secs(parse_var(
        "CHECKOUT_DEDUPE_WINDOW_SECS",
        get_env("CHECKOUT_DEDUPE_WINDOW_SECS"),
        defaults.dedupe_window.as_secs(),
      )?),
      order_number_max_attempts: parse_var(
        "ORDER_NUMBER_MAX_ATTEMPTS",
        get_env("ORDER_NUMBER_MAX_ATTEMPTS"),
        defaults.order_number_max_attempts,
      )?,
      bank_transfer: BankTransferDetails {
        bank_name: get_env("BANK_NAME").unwrap_or(defaults_bank.bank_name),
        account_number: get_env("BANK_ACCOUNT").unwrap_or(defaults_bank.account_number),
        account_holder: get_env("BANK_ACCOUNT_HOLDER").unwrap_or(defaults_bank.account_holder),
      },
    };
    if checkout.payment_poll_interval.is_zero() {
      return Err(AppError::Config("PAYMENT_POLL_INTERVAL_MS must be positive".to_string()));
    }
    if checkout.order_number_max_attempts == 0 {
      return Err(AppError::Config("ORDER_NUMBER_MAX_ATTEMPTS must be at least 1".to_string()));
    }

    tracing::info!(backend = ?store_backend, simulated_gateway = payment_gateway.is_none(), "Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      run_migrations,
      seed_demo_catalog,
      payment_gateway,
      log_format,
      checkout,
    })
  }
}

fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match raw {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    None => Ok(default),
  }
}
