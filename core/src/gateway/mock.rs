// orderflow/src/gateway/mock.rs

//! In-process gateway for tests, local runs and benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{GatewaySession, GatewayStatus, PaymentGateway, SessionRequest};
use crate::domain::notification::{self, format_amount};
use crate::domain::{PaymentStatus, VerifiedNotification};
use crate::error::{OrderError, OrderResult};

#[derive(Debug, Default)]
struct MockState {
  failing: bool,
  latency: Duration,
  sessions: Vec<SessionRequest>,
  statuses: HashMap<String, GatewayStatus>,
}

/// Signs notifications with the same scheme as the real gateway, so the
/// verification path under test is the production one.
#[derive(Debug)]
pub struct MockGateway {
  server_key: String,
  state: Mutex<MockState>,
}

impl MockGateway {
  pub fn new(server_key: impl Into<String>) -> Self {
    Self {
      server_key: server_key.into(),
      state: Mutex::new(MockState::default()),
    }
  }

  pub fn server_key(&self) -> &str {
    &self.server_key
  }

  /// While set, `create_session` and `transaction_status` fail with
  /// `GatewayUnavailable`.
  pub fn set_failing(&self, failing: bool) {
    self.state.lock().failing = failing;
  }

  /// Delay applied before every remote call.
  pub fn set_latency(&self, latency: Duration) {
    self.state.lock().latency = latency;
  }

  /// Number of sessions created so far.
  pub fn session_count(&self) -> usize {
    self.state.lock().sessions.len()
  }

  pub fn sessions(&self) -> Vec<SessionRequest> {
    self.state.lock().sessions.clone()
  }

  /// Sets what `transaction_status` reports for `reference`.
  pub fn set_transaction_status(&self, reference: &str, status: PaymentStatus, gross_amount: i64) {
    let pulled = GatewayStatus {
      reference: reference.to_string(),
      transaction_id: Some(format!("mock-tx-{}", reference)),
      status,
      gross_amount,
      payment_type: Some("bank_transfer".to_string()),
      raw: json!({
        "order_id": reference,
        "transaction_status": status.as_str(),
        "gross_amount": format_amount(gross_amount),
      }),
    };
    self.state.lock().statuses.insert(reference.to_string(), pulled);
  }

  /// A correctly signed notification body, as the gateway would POST it.
  pub fn notification(&self, reference: &str, transaction_status: &str, gross_amount: i64) -> Vec<u8> {
    let status_code = status_code_for(transaction_status);
    let amount = format_amount(gross_amount);
    let signature = notification::sign(reference, status_code, &amount, &self.server_key);
    let body = json!({
      "order_id": reference,
      "transaction_id": format!("mock-tx-{}", reference),
      "transaction_status": transaction_status,
      "fraud_status": "accept",
      "status_code": status_code,
      "gross_amount": amount,
      "signature_key": signature,
      "payment_type": "bank_transfer",
    });
    body.to_string().into_bytes()
  }

  async fn simulate_call(&self) -> OrderResult<()> {
    let (failing, latency) = {
      let state = self.state.lock();
      (state.failing, state.latency)
    };
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }
    if failing {
      return Err(OrderError::GatewayUnavailable {
        message: "mock gateway is configured to fail".to_string(),
      });
    }
    Ok(())
  }
}

fn status_code_for(transaction_status: &str) -> &'static str {
  match transaction_status {
    "capture" | "settlement" => "200",
    "pending" => "201",
    _ => "202",
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  #[instrument(name = "MockGateway::create_session", skip_all, fields(reference = %request.reference))]
  async fn create_session(&self, request: &SessionRequest) -> OrderResult<GatewaySession> {
    self.simulate_call().await?;

    let token = format!("mock-{}", Uuid::new_v4().simple());
    let redirect_url = format!("https://mock-gateway.local/pay/{}", token);
    self.state.lock().sessions.push(request.clone());
    info!(gross_amount = request.gross_amount, "Mock session created.");

    Ok(GatewaySession {
      raw: json!({ "token": token, "redirect_url": redirect_url }),
      token,
      redirect_url,
    })
  }

  async fn transaction_status(&self, reference: &str) -> OrderResult<Option<GatewayStatus>> {
    self.simulate_call().await?;
    Ok(self.state.lock().statuses.get(reference).cloned())
  }

  fn verify_notification(&self, raw_body: &[u8]) -> OrderResult<VerifiedNotification> {
    notification::verify(raw_body, &self.server_key)
  }
}
