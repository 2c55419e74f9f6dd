// orderflow/src/domain/reconcile.rs

//! Pure rules for applying a verified gateway notification to a payment and
//! its order. Stores call [`apply`] inside their per-order critical section
//! and persist whatever it changed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::notification::VerifiedNotification;
use super::order::{Order, OrderStatus};
use super::payment::{Payment, PaymentStatus};
use crate::error::{OrderError, OrderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePlan {
  pub payment_status: PaymentStatus,
  pub order_target: Option<OrderStatus>,
  /// Money arrived for an order that was already closed.
  pub needs_refund: bool,
}

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
  Applied {
    reference: String,
    order_id: Uuid,
    payment_status: PaymentStatus,
    order_status: OrderStatus,
    needs_refund: bool,
  },
  /// Already applied earlier; nothing changed.
  Duplicate { reference: String, status: PaymentStatus },
  /// Older than what we have; nothing changed.
  Stale {
    reference: String,
    current: String,
    incoming: PaymentStatus,
  },
}

impl Reconciliation {
  pub fn changed_state(&self) -> bool {
    matches!(self, Reconciliation::Applied { .. })
  }
}

/// Decides what a notification does, without touching anything.
pub fn plan(payment: &Payment, order: &Order, notice: &VerifiedNotification) -> OrderResult<ReconcilePlan> {
  if notice.gross_amount != payment.amount {
    return Err(OrderError::rejected(format!(
      "gross_amount {} does not match payment amount {}",
      notice.gross_amount, payment.amount
    )));
  }

  let payment_status = payment.status.merge(notice.status, &payment.reference)?;

  let (order_target, needs_refund) = match order.status() {
    OrderStatus::Pending if payment_status.is_success() => (Some(OrderStatus::Paid), false),
    OrderStatus::Pending if payment_status.is_failure() => (Some(OrderStatus::Canceled), false),
    OrderStatus::Canceled | OrderStatus::Expired if payment_status.is_success() => (None, true),
    _ => (None, false),
  };

  Ok(ReconcilePlan {
    payment_status,
    order_target,
    needs_refund,
  })
}

/// Effect of [`apply`] that the store still has to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
  pub reconciliation: Reconciliation,
  /// Give the order's reserved stock back.
  pub release_stock: bool,
}

/// Mutates `payment` and `order` in place according to [`plan`].
///
/// Duplicate and stale notifications come back as
/// `DuplicateNotification` / `InvalidTransition` errors with both values
/// untouched.
pub fn apply(
  payment: &mut Payment,
  order: &mut Order,
  notice: &VerifiedNotification,
  at: DateTime<Utc>,
) -> OrderResult<Applied> {
  let plan = plan(payment, order, notice)?;

  let release_stock = match plan.order_target {
    Some(target) => order.transition(target, at)?,
    None => false,
  };

  payment.status = plan.payment_status;
  payment.raw_payload = Some(notice.raw.clone());
  payment.updated_at = at;
  if notice.transaction_id.is_some() {
    payment.gateway_transaction_id = notice.transaction_id.clone();
  }
  if notice.payment_type.is_some() {
    payment.payment_type = notice.payment_type.clone();
  }

  Ok(Applied {
    reconciliation: Reconciliation::Applied {
      reference: payment.reference.clone(),
      order_id: order.id(),
      payment_status: plan.payment_status,
      order_status: order.status(),
      needs_refund: plan.needs_refund,
    },
    release_stock,
  })
}
