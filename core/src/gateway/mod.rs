// orderflow/src/gateway/mod.rs

//! The external payment gateway seam.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{LineItem, PaymentStatus, VerifiedNotification};
use crate::error::OrderResult;

pub use mock::MockGateway;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
  pub first_name: String,
  pub email: String,
  pub phone: Option<String>,
}

/// Everything a gateway needs to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
  /// Our payment reference; the gateway echoes it back as its `order_id`.
  pub reference: String,
  pub gross_amount: i64,
  pub customer: CustomerDetails,
  pub items: Vec<LineItem>,
  pub finish_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySession {
  pub token: String,
  pub redirect_url: String,
  pub raw: serde_json::Value,
}

/// A transaction status pulled from the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayStatus {
  pub reference: String,
  pub transaction_id: Option<String>,
  pub status: PaymentStatus,
  pub gross_amount: i64,
  pub payment_type: Option<String>,
  pub raw: serde_json::Value,
}

impl GatewayStatus {
  /// A pulled status is as trustworthy as a signed push: it came over our own
  /// authenticated connection.
  pub fn into_notification(self) -> VerifiedNotification {
    VerifiedNotification {
      reference: self.reference,
      transaction_id: self.transaction_id,
      status: self.status,
      gross_amount: self.gross_amount,
      payment_type: self.payment_type,
      raw: self.raw,
    }
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  /// Opens a checkout session. Transport failures and gateway-side errors
  /// are `GatewayUnavailable`.
  async fn create_session(&self, request: &SessionRequest) -> OrderResult<GatewaySession>;

  /// Current status of the transaction for `reference`, or `None` when the
  /// gateway has no transaction for it yet.
  async fn transaction_status(&self, reference: &str) -> OrderResult<Option<GatewayStatus>>;

  /// Authenticates a raw notification body against the shared secret.
  fn verify_notification(&self, raw_body: &[u8]) -> OrderResult<VerifiedNotification>;
}
