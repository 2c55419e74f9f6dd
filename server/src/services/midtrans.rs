// storefront/src/services/midtrans.rs

//! Midtrans Snap adapter for the `PaymentGateway` port.
//!
//! Owns transport only: request bodies, Basic auth with the server key,
//! timeout and HTTP error mapping, and decoding into gateway types.

use async_trait::async_trait;
use orderflow::domain::notification::{self, parse_amount};
use orderflow::{
  GatewaySession, GatewayStatus, OrderError, OrderResult, PaymentGateway, PaymentStatus, SessionRequest,
  VerifiedNotification,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, instrument};

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com";

/// Midtrans truncates longer item names.
const ITEM_NAME_LIMIT: usize = 50;

pub struct MidtransGateway {
  client: Client,
  server_key: String,
  snap_url: String,
  api_url: String,
}

impl MidtransGateway {
  /// # Errors
  ///
  /// Returns an error when the reqwest client cannot be constructed.
  pub fn new(server_key: impl Into<String>, is_production: bool, timeout: Duration) -> Result<Self, reqwest::Error> {
    let (snap_url, api_url) = if is_production {
      (PRODUCTION_SNAP_URL, PRODUCTION_API_URL)
    } else {
      (SANDBOX_SNAP_URL, SANDBOX_API_URL)
    };
    Self::with_urls(server_key, snap_url, api_url, timeout)
  }

  pub fn with_urls(
    server_key: impl Into<String>,
    snap_url: &str,
    api_url: &str,
    timeout: Duration,
  ) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      server_key: server_key.into(),
      snap_url: snap_url.trim_end_matches('/').to_string(),
      api_url: api_url.trim_end_matches('/').to_string(),
    })
  }
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
  token: String,
  redirect_url: String,
}

fn unavailable(message: impl Into<String>) -> OrderError {
  OrderError::GatewayUnavailable {
    message: message.into(),
  }
}

fn map_transport_error(err: reqwest::Error) -> OrderError {
  if err.is_timeout() {
    unavailable("midtrans request timed out")
  } else {
    unavailable(format!("midtrans transport error: {}", err))
  }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> OrderError {
  let excerpt: String = String::from_utf8_lossy(body).chars().take(200).collect();
  unavailable(format!("midtrans answered {}: {}", status.as_u16(), excerpt))
}

/// Snap `POST /snap/v1/transactions` body.
pub fn snap_payload(request: &SessionRequest) -> Value {
  let items: Vec<Value> = request
    .items
    .iter()
    .map(|item| {
      json!({
        "id": item.sku,
        "price": item.unit_price,
        "quantity": item.quantity,
        "name": item.name.chars().take(ITEM_NAME_LIMIT).collect::<String>(),
      })
    })
    .collect();

  let mut payload = json!({
    "transaction_details": {
      "order_id": request.reference,
      "gross_amount": request.gross_amount,
    },
    "customer_details": {
      "first_name": request.customer.first_name,
      "email": request.customer.email,
      "phone": request.customer.phone.clone().unwrap_or_default(),
    },
    "item_details": items,
    "credit_card": { "secure": true },
  });
  if let Some(finish) = &request.finish_url {
    payload["callbacks"] = json!({ "finish": finish });
  }
  payload
}

/// Decodes a `GET /v2/{order_id}/status` body. Midtrans reports an unknown
/// transaction with `status_code: "404"` in an otherwise successful response.
pub fn parse_status(reference: &str, body: Value) -> OrderResult<Option<GatewayStatus>> {
  let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

  if field("status_code").as_deref() == Some("404") {
    return Ok(None);
  }
  let transaction_status =
    field("transaction_status").ok_or_else(|| unavailable("status response without transaction_status"))?;
  let gross_amount = field("gross_amount")
    .as_deref()
    .and_then(parse_amount)
    .ok_or_else(|| unavailable("status response without a valid gross_amount"))?;
  if let Some(echoed) = field("order_id") {
    if echoed != reference {
      return Err(unavailable(format!("status response for '{}' instead of '{}'", echoed, reference)));
    }
  }

  Ok(Some(GatewayStatus {
    reference: reference.to_string(),
    transaction_id: field("transaction_id"),
    status: PaymentStatus::from_gateway(&transaction_status, field("fraud_status").as_deref()),
    gross_amount,
    payment_type: field("payment_type"),
    raw: body,
  }))
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
  fn name(&self) -> &'static str {
    "midtrans"
  }

  #[instrument(name = "MidtransGateway::create_session", skip_all, fields(reference = %request.reference))]
  async fn create_session(&self, request: &SessionRequest) -> OrderResult<GatewaySession> {
    let response = self
      .client
      .post(format!("{}/snap/v1/transactions", self.snap_url))
      .basic_auth(&self.server_key, Some(""))
      .header(reqwest::header::ACCEPT, "application/json")
      .json(&snap_payload(request))
      .send()
      .await
      .map_err(map_transport_error)?;

    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;
    if !status.is_success() {
      let err = map_status_error(status, &body);
      error!(error = %err, "Snap transaction creation failed.");
      return Err(err);
    }

    let raw: Value = serde_json::from_slice(&body).map_err(|e| unavailable(format!("invalid Snap JSON: {}", e)))?;
    let snap: SnapResponse =
      serde_json::from_value(raw.clone()).map_err(|e| unavailable(format!("unexpected Snap response: {}", e)))?;
    info!("Snap transaction created.");
    Ok(GatewaySession {
      token: snap.token,
      redirect_url: snap.redirect_url,
      raw,
    })
  }

  #[instrument(name = "MidtransGateway::transaction_status", skip(self))]
  async fn transaction_status(&self, reference: &str) -> OrderResult<Option<GatewayStatus>> {
    let response = self
      .client
      .get(format!("{}/v2/{}/status", self.api_url, reference))
      .basic_auth(&self.server_key, Some(""))
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(map_transport_error)?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let body = response.bytes().await.map_err(map_transport_error)?;
    if !status.is_success() {
      return Err(map_status_error(status, &body));
    }
    let value: Value =
      serde_json::from_slice(&body).map_err(|e| unavailable(format!("invalid status JSON: {}", e)))?;
    parse_status(reference, value)
  }

  fn verify_notification(&self, raw_body: &[u8]) -> OrderResult<VerifiedNotification> {
    notification::verify(raw_body, &self.server_key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use orderflow::{CustomerDetails, LineItem};
  use uuid::Uuid;

  fn request() -> SessionRequest {
    SessionRequest {
      reference: "ORD-20261019-0A1B2C3D-P1".to_string(),
      gross_amount: 75_000,
      customer: CustomerDetails {
        first_name: "Budi".to_string(),
        email: "budi@example.com".to_string(),
        phone: None,
      },
      items: vec![LineItem {
        product_id: Uuid::new_v4(),
        sku: "HW-LAMBO-001".to_string(),
        name: "Hot Wheels Lamborghini Huracan with an unusually long marketing name".to_string(),
        quantity: 3,
        unit_price: 25_000,
      }],
      finish_url: Some("https://shop.example.com/payment/success".to_string()),
    }
  }

  #[test]
  fn snap_payload_carries_reference_amount_and_items() {
    let payload = snap_payload(&request());
    assert_eq!(payload["transaction_details"]["order_id"], "ORD-20261019-0A1B2C3D-P1");
    assert_eq!(payload["transaction_details"]["gross_amount"], 75_000);
    assert_eq!(payload["item_details"][0]["id"], "HW-LAMBO-001");
    assert_eq!(payload["item_details"][0]["quantity"], 3);
    assert_eq!(
      payload["item_details"][0]["name"].as_str().unwrap().chars().count(),
      ITEM_NAME_LIMIT
    );
    assert_eq!(payload["callbacks"]["finish"], "https://shop.example.com/payment/success");
  }

  #[test]
  fn status_body_maps_through_fraud_screening() {
    let body = json!({
      "status_code": "200",
      "order_id": "ORD-1-P1",
      "transaction_id": "tx-9",
      "transaction_status": "capture",
      "fraud_status": "challenge",
      "gross_amount": "75000.00",
      "payment_type": "credit_card",
    });
    let status = parse_status("ORD-1-P1", body).unwrap().unwrap();
    assert_eq!(status.status, PaymentStatus::Pending);
    assert_eq!(status.gross_amount, 75_000);
    assert_eq!(status.transaction_id.as_deref(), Some("tx-9"));
  }

  #[test]
  fn unknown_transaction_is_none() {
    let body = json!({"status_code": "404", "status_message": "Transaction doesn't exist."});
    assert!(parse_status("ORD-1-P1", body).unwrap().is_none());
  }

  #[test]
  fn mismatched_or_incomplete_status_is_unavailable() {
    let other = json!({"order_id": "ORD-2-P1", "transaction_status": "settlement", "gross_amount": "1.00"});
    assert!(matches!(parse_status("ORD-1-P1", other), Err(OrderError::GatewayUnavailable { .. })));
    let partial = json!({"order_id": "ORD-1-P1"});
    assert!(parse_status("ORD-1-P1", partial).is_err());
  }

  #[test]
  fn notifications_use_the_server_key() {
    let gateway = MidtransGateway::new("SB-Mid-server-test", false, Duration::from_secs(1)).unwrap();
    let amount = notification::format_amount(75_000);
    let body = json!({
      "order_id": "ORD-1-P1",
      "transaction_status": "settlement",
      "status_code": "200",
      "gross_amount": amount,
      "signature_key": notification::sign("ORD-1-P1", "200", &amount, "SB-Mid-server-test"),
    });
    let verified = gateway.verify_notification(body.to_string().as_bytes()).unwrap();
    assert_eq!(verified.status, PaymentStatus::Settlement);
    assert_eq!(gateway.name(), "midtrans");
  }
}
