// server/src/services/mobile_money.rs

//! HTTP client for the mobile money push provider.
//!
//! `POST {base}/v1/push` starts a push and answers with the provider's
//! reference; `GET {base}/v1/payments/{reference}` reports its state. The
//! provider also calls our webhook, which is handled elsewhere.

use crate::config::PaymentGatewayConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use lmi_checkout::model::{Money, CURRENCY_CODE};
use lmi_checkout::payment::{GatewayError, Msisdn, PaymentGateway, ProviderStatus, PushReceipt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
  msisdn: String,
  amount: i64,
  currency: &'static str,
  merchant_reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
  provider_reference: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
  #[serde(alias = "error")]
  message: String,
}

pub struct HttpMobileMoneyGateway {
  client: Client,
  base_url: String,
  api_key: String,
}

impl HttpMobileMoneyGateway {
  pub fn new(config: &PaymentGatewayConfig) -> Result<Self, AppError> {
    let client = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| AppError::Config(format!("Could not build payment gateway client: {}", e)))?;
    Ok(Self {
      client,
      base_url: config.base_url.clone(),
      api_key: config.api_key.clone(),
    })
  }
}

fn unreachable(err: reqwest::Error) -> GatewayError {
  GatewayError::Unreachable(err.into())
}

/// Turns a non-2xx answer into the matching `GatewayError`.
async fn error_for(response: reqwest::Response) -> GatewayError {
  let status = response.status();
  let message = match response.json::<ProviderErrorBody>().await {
    Ok(body) => body.message,
    Err(_) => status.canonical_reason().unwrap_or("no reason given").to_string(),
  };
  if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
    GatewayError::Rejected(message)
  } else {
    GatewayError::Unreachable(anyhow::anyhow!("provider answered {}: {}", status, message))
  }
}

#[async_trait]
impl PaymentGateway for HttpMobileMoneyGateway {
  #[instrument(name = "HttpMobileMoneyGateway::initiate_push", skip_all, fields(%amount, merchant_reference), err(Display))]
  async fn initiate_push(
    &self,
    msisdn: &Msisdn,
    amount: Money,
    merchant_reference: &str,
  ) -> Result<PushReceipt, GatewayError> {
    let response = self
      .client
      .post(format!("{}/v1/push", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&PushRequest {
        msisdn: msisdn.international(),
        amount: amount.minor_units(),
        currency: CURRENCY_CODE,
        merchant_reference,
      })
      .send()
      .await
      .map_err(unreachable)?;

    if !response.status().is_success() {
      let err = error_for(response).await;
      warn!(error = %err, "Push request refused.");
      return Err(err);
    }
    let body: PushResponse = response
      .json()
      .await
      .map_err(|e| GatewayError::Protocol(format!("unreadable push response: {}", e)))?;
    info!(provider_reference = %body.provider_reference, "Push accepted by provider.");
    Ok(PushReceipt {
      provider_reference: body.provider_reference,
    })
  }

  async fn query_status(&self, provider_reference: &str) -> Result<ProviderStatus, GatewayError> {
    let response = self
      .client
      .get(format!("{}/v1/payments/{}", self.base_url, provider_reference))
      .bearer_auth(&self.api_key)
      .send()
      .await
      .map_err(unreachable)?;

    if !response.status().is_success() {
      return Err(error_for(response).await);
    }
    response
      .json::<ProviderStatus>()
      .await
      .map_err(|e| GatewayError::Protocol(format!("unreadable status response: {}", e)))
  }
}
