// orderflow/src/domain/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::order::Order;
use crate::error::{OrderError, OrderResult};

/// Gateway transaction status, ordered as a monotonic lattice.
///
/// ```text
///            ┌──> capture ──> settlement
///  pending ──┼──> settlement
///            └──> deny | cancel | expire | failure
/// ```
/// Terminal states never move again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Capture,
  Settlement,
  Deny,
  Cancel,
  Expire,
  Failure,
}

impl PaymentStatus {
  pub const fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Capture => "capture",
      PaymentStatus::Settlement => "settlement",
      PaymentStatus::Deny => "deny",
      PaymentStatus::Cancel => "cancel",
      PaymentStatus::Expire => "expire",
      PaymentStatus::Failure => "failure",
    }
  }

  /// Maps a gateway `transaction_status` / `fraud_status` pair.
  ///
  /// Captures and settlements that fraud screening did not accept stay
  /// `pending` (manual review). Unknown statuses are `pending` too.
  pub fn from_gateway(transaction_status: &str, fraud_status: Option<&str>) -> Self {
    let accepted = fraud_status.map_or(true, |f| f == "accept");
    match transaction_status {
      "settlement" if accepted => PaymentStatus::Settlement,
      "capture" if accepted => PaymentStatus::Capture,
      "deny" => PaymentStatus::Deny,
      "cancel" => PaymentStatus::Cancel,
      "expire" => PaymentStatus::Expire,
      "failure" => PaymentStatus::Failure,
      _ => PaymentStatus::Pending,
    }
  }

  pub const fn is_terminal(&self) -> bool {
    !matches!(self, PaymentStatus::Pending | PaymentStatus::Capture)
  }

  pub const fn is_success(&self) -> bool {
    matches!(self, PaymentStatus::Capture | PaymentStatus::Settlement)
  }

  pub const fn is_failure(&self) -> bool {
    matches!(
      self,
      PaymentStatus::Deny | PaymentStatus::Cancel | PaymentStatus::Expire | PaymentStatus::Failure
    )
  }

  /// Whether `to` is strictly above `self` in the lattice.
  pub const fn can_advance(&self, to: PaymentStatus) -> bool {
    match self {
      PaymentStatus::Pending => !matches!(to, PaymentStatus::Pending),
      PaymentStatus::Capture => matches!(to, PaymentStatus::Settlement),
      _ => false,
    }
  }

  /// Apply-if-newer merge of an incoming status.
  ///
  /// The same status again is a `DuplicateNotification`; anything not above
  /// the current status is a stale `InvalidTransition`. Both leave state
  /// untouched.
  pub fn merge(self, incoming: PaymentStatus, reference: &str) -> OrderResult<PaymentStatus> {
    if self == incoming {
      return Err(OrderError::DuplicateNotification {
        reference: reference.to_string(),
        status: incoming.to_string(),
      });
    }
    if !self.can_advance(incoming) {
      return Err(OrderError::invalid_transition(self, incoming));
    }
    Ok(incoming)
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = OrderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(PaymentStatus::Pending),
      "capture" => Ok(PaymentStatus::Capture),
      "settlement" => Ok(PaymentStatus::Settlement),
      "deny" => Ok(PaymentStatus::Deny),
      "cancel" => Ok(PaymentStatus::Cancel),
      "expire" => Ok(PaymentStatus::Expire),
      "failure" => Ok(PaymentStatus::Failure),
      other => Err(OrderError::Validation(format!("unknown payment status '{}'", other))),
    }
  }
}

/// One payment attempt for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  /// Identifier sent to the gateway and echoed in its notifications.
  pub reference: String,
  pub attempt: i32,
  /// `None` while the gateway session is still being created.
  pub token: Option<String>,
  pub redirect_url: Option<String>,
  pub gateway_transaction_id: Option<String>,
  pub payment_type: Option<String>,
  pub amount: i64,
  pub status: PaymentStatus,
  pub raw_payload: Option<serde_json::Value>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Payment {
  /// A fresh `pending` attempt with no gateway session yet.
  pub fn claim(order: &Order, attempt: i32, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id: order.id(),
      reference: payment_reference(order.number(), attempt),
      attempt,
      token: None,
      redirect_url: None,
      gateway_transaction_id: None,
      payment_type: None,
      amount: order.total(),
      status: PaymentStatus::Pending,
      raw_payload: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_active(&self) -> bool {
    !self.status.is_terminal()
  }

  pub fn has_session(&self) -> bool {
    self.token.is_some()
  }
}

pub fn payment_reference(order_number: &str, attempt: i32) -> String {
  format!("{}-P{}", order_number, attempt)
}

/// What a caller needs to send the customer to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSession {
  pub payment_id: Uuid,
  pub order_id: Uuid,
  pub reference: String,
  pub token: String,
  pub redirect_url: String,
  /// `true` when an existing session was returned instead of a new one.
  pub reused: bool,
}

impl PaymentSession {
  pub fn from_payment(payment: &Payment, reused: bool) -> Option<Self> {
    Some(Self {
      payment_id: payment.id,
      order_id: payment.order_id,
      reference: payment.reference.clone(),
      token: payment.token.clone()?,
      redirect_url: payment.redirect_url.clone().unwrap_or_default(),
      reused,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use PaymentStatus::*;

  const ALL: [PaymentStatus; 7] = [Pending, Capture, Settlement, Deny, Cancel, Expire, Failure];

  #[test]
  fn gateway_mapping_follows_fraud_screening() {
    assert_eq!(PaymentStatus::from_gateway("settlement", Some("accept")), Settlement);
    assert_eq!(PaymentStatus::from_gateway("settlement", None), Settlement);
    assert_eq!(PaymentStatus::from_gateway("settlement", Some("challenge")), Pending);
    assert_eq!(PaymentStatus::from_gateway("capture", Some("accept")), Capture);
    assert_eq!(PaymentStatus::from_gateway("capture", Some("challenge")), Pending);
    assert_eq!(PaymentStatus::from_gateway("deny", Some("deny")), Deny);
    assert_eq!(PaymentStatus::from_gateway("expire", None), Expire);
    assert_eq!(PaymentStatus::from_gateway("refund", None), Pending);
    assert_eq!(PaymentStatus::from_gateway("something-new", None), Pending);
  }

  #[test]
  fn terminal_states_never_advance() {
    for from in ALL.into_iter().filter(PaymentStatus::is_terminal) {
      for to in ALL {
        assert!(!from.can_advance(to), "{} must not advance to {}", from, to);
      }
    }
  }

  #[test]
  fn settlement_is_never_downgraded_to_pending() {
    assert!(matches!(Settlement.merge(Pending, "r"), Err(OrderError::InvalidTransition { .. })));
    assert!(matches!(Capture.merge(Pending, "r"), Err(OrderError::InvalidTransition { .. })));
    assert_eq!(Capture.merge(Settlement, "r").unwrap(), Settlement);
  }

  #[test]
  fn same_status_is_a_duplicate() {
    for status in ALL {
      assert!(matches!(status.merge(status, "r"), Err(OrderError::DuplicateNotification { .. })));
    }
  }

  #[test]
  fn success_after_capture_cannot_turn_into_failure() {
    for failure in [Deny, Cancel, Expire, Failure] {
      assert!(Capture.merge(failure, "r").is_err());
    }
  }

  #[test]
  fn lattice_is_antisymmetric() {
    for a in ALL {
      for b in ALL {
        assert!(!(a.can_advance(b) && b.can_advance(a)));
      }
    }
  }
}
