// orderflow/src/domain/notification.rs

//! Gateway notification parsing and authenticity checks.
//!
//! The signature scheme is the Midtrans one:
//! `signature_key = hex(SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`,
//! where `order_id` is our payment reference.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::payment::PaymentStatus;
use crate::error::{OrderError, OrderResult};

/// Notification body as the gateway sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
  #[serde(rename = "order_id")]
  pub reference: String,
  #[serde(default)]
  pub transaction_id: Option<String>,
  pub transaction_status: String,
  #[serde(default)]
  pub fraud_status: Option<String>,
  pub status_code: String,
  pub gross_amount: String,
  pub signature_key: String,
  #[serde(default)]
  pub payment_type: Option<String>,
  #[serde(default)]
  pub transaction_time: Option<String>,
}

/// A notification whose signature checked out. Only this type reaches the
/// reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedNotification {
  pub reference: String,
  pub transaction_id: Option<String>,
  pub status: PaymentStatus,
  pub gross_amount: i64,
  pub payment_type: Option<String>,
  pub raw: serde_json::Value,
}

pub fn sign(reference: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
  let mut hasher = Sha512::new();
  hasher.update(reference.as_bytes());
  hasher.update(status_code.as_bytes());
  hasher.update(gross_amount.as_bytes());
  hasher.update(server_key.as_bytes());
  hex::encode(hasher.finalize())
}

/// The gateway's amount format: whole units with a `.00` suffix.
pub fn format_amount(amount: i64) -> String {
  format!("{}.00", amount)
}

/// Parses `"150000.00"` / `"150000"`. Non-zero fractions are rejected because
/// every amount we issue is in whole units.
pub fn parse_amount(raw: &str) -> Option<i64> {
  let (whole, fraction) = match raw.split_once('.') {
    Some((whole, fraction)) => (whole, fraction),
    None => (raw, ""),
  };
  if !fraction.chars().all(|c| c == '0') {
    return None;
  }
  whole.parse::<i64>().ok().filter(|amount| *amount >= 0)
}

/// Parses and authenticates a raw notification body.
///
/// Nothing in the payload is trusted until the signature matches.
pub fn verify(raw_body: &[u8], server_key: &str) -> OrderResult<VerifiedNotification> {
  let raw: serde_json::Value = serde_json::from_slice(raw_body).map_err(|e| {
    warn!(error = %e, "Rejecting notification: body is not JSON.");
    OrderError::rejected(format!("malformed payload: {}", e))
  })?;
  let notification: GatewayNotification = serde_json::from_value(raw.clone()).map_err(|e| {
    warn!(error = %e, "Rejecting notification: missing or invalid fields.");
    OrderError::rejected(format!("malformed payload: {}", e))
  })?;

  let expected = sign(
    &notification.reference,
    &notification.status_code,
    &notification.gross_amount,
    server_key,
  );
  let provided = notification.signature_key.to_ascii_lowercase();
  if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
    warn!(reference = %notification.reference, "Rejecting notification: signature mismatch.");
    return Err(OrderError::rejected("signature mismatch"));
  }

  let gross_amount = parse_amount(&notification.gross_amount).ok_or_else(|| {
    warn!(reference = %notification.reference, gross_amount = %notification.gross_amount, "Rejecting notification: bad amount.");
    OrderError::rejected(format!("invalid gross_amount '{}'", notification.gross_amount))
  })?;

  Ok(VerifiedNotification {
    status: PaymentStatus::from_gateway(&notification.transaction_status, notification.fraud_status.as_deref()),
    reference: notification.reference,
    transaction_id: notification.transaction_id,
    gross_amount,
    payment_type: notification.payment_type,
    raw,
  })
}
