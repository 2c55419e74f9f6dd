// orderflow/src/ports.rs

//! Storage seams. `MemoryStore` implements all of them in-process; the server
//! crate implements them over PostgreSQL.
//!
//! Every mutating method is one atomic unit: implementations serialize work
//! per order (and per product row for stock) so concurrent callers cannot
//! both win a transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{CloseReason, Order, Payment, Product, Reconciliation, VerifiedNotification};
use crate::error::OrderResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
  pub limit: u32,
  pub offset: u32,
}

impl Page {
  pub const MAX_LIMIT: u32 = 100;

  pub fn new(limit: u32, offset: u32) -> Self {
    Self {
      limit: limit.clamp(1, Self::MAX_LIMIT),
      offset,
    }
  }
}

impl Default for Page {
  fn default() -> Self {
    Self { limit: 20, offset: 0 }
  }
}

#[async_trait]
pub trait Catalog: Send + Sync {
  /// Products with the given ids. Unknown ids are simply absent.
  async fn products(&self, ids: &[Uuid]) -> OrderResult<Vec<Product>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Decrements stock for every line and inserts the order, all or nothing.
  ///
  /// Fails with `InsufficientStock` naming every short product; in that case
  /// neither stock nor orders changed.
  async fn create_reserved(&self, order: Order) -> OrderResult<Order>;

  async fn order(&self, order_id: Uuid) -> OrderResult<Option<Order>>;

  async fn order_by_number(&self, number: &str) -> OrderResult<Option<Order>>;

  /// Newest first.
  async fn orders_for_user(&self, user_id: Uuid, page: Page) -> OrderResult<Vec<Order>>;

  /// Moves a `PENDING` order to the reason's target state and gives its stock
  /// back when that state requires it. From any other state this is an
  /// `InvalidTransition` with no side effect.
  async fn close(&self, order_id: Uuid, reason: CloseReason, at: DateTime<Utc>) -> OrderResult<Order>;

  /// Ids of `PENDING` orders created at or before `cutoff`, oldest first.
  async fn overdue(&self, cutoff: DateTime<Utc>, limit: u32) -> OrderResult<Vec<Uuid>>;
}

/// Outcome of [`PaymentStore::claim_slot`].
#[derive(Debug, Clone, PartialEq)]
pub enum SlotClaim {
  /// The new payment was inserted; the caller owns it.
  Claimed(Payment),
  /// The order already has an active payment.
  Existing(Payment),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
  /// Inserts `payment` iff its order is `PENDING` and has no active payment.
  ///
  /// An active payment without a session that was created before
  /// `stale_before` is treated as abandoned: it is marked `failure` and the
  /// slot is handed to `payment`.
  async fn claim_slot(&self, payment: Payment, stale_before: DateTime<Utc>) -> OrderResult<SlotClaim>;

  async fn attach_session(
    &self,
    payment_id: Uuid,
    token: &str,
    redirect_url: &str,
    raw: serde_json::Value,
  ) -> OrderResult<Payment>;

  /// Frees a slot whose gateway session could not be created by marking the
  /// payment `failure`. Only touches a payment that still has no session.
  /// The row is kept so its reference is never reused.
  async fn release_slot(&self, payment_id: Uuid) -> OrderResult<()>;

  async fn payment_by_reference(&self, reference: &str) -> OrderResult<Option<Payment>>;

  /// Newest attempt first.
  async fn payments_for_order(&self, order_id: Uuid) -> OrderResult<Vec<Payment>>;

  /// Applies a verified notification to its payment and cascades to the
  /// order, under one per-order critical section.
  ///
  /// Already-applied and older statuses come back as
  /// `DuplicateNotification` / `InvalidTransition` with nothing changed.
  async fn apply_notification(&self, notice: &VerifiedNotification, at: DateTime<Utc>) -> OrderResult<Reconciliation>;
}
