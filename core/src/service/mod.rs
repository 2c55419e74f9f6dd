// orderflow/src/service/mod.rs

//! `OrderService`: the operations callers invoke, orchestrated over the
//! storage ports and the payment gateway.

mod checkout;
mod expiry;
mod payment_session;
mod reconciler;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Actor, CloseReason, Order, OrderStatus};
use crate::error::{OrderError, OrderResult};
use crate::gateway::PaymentGateway;
use crate::ports::{Catalog, OrderStore, Page, PaymentStore};
use crate::workflow::Pipeline;

pub use checkout::{CheckoutCtx, NewOrder, OrderLine};
pub use payment_session::{PaymentSessionCtx, PaymentView};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// How long a `PENDING` order waits for payment before it expires.
  pub payment_window: chrono::Duration,
  /// Upper bound on every storage call.
  pub store_timeout: Duration,
  /// Upper bound on every gateway call.
  pub gateway_timeout: Duration,
  /// A payment slot still without a session after this long is considered
  /// abandoned and may be reclaimed. Never effectively shorter than
  /// [`ServiceConfig::min_session_claim_ttl`].
  pub session_claim_ttl: chrono::Duration,
  /// Orders expired per sweep.
  pub expiry_batch_size: u32,
  /// Where the gateway sends the customer after paying.
  pub finish_url: Option<String>,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      payment_window: chrono::Duration::minutes(60),
      store_timeout: Duration::from_secs(5),
      gateway_timeout: Duration::from_secs(10),
      session_claim_ttl: chrono::Duration::seconds(30),
      expiry_batch_size: 100,
      finish_url: None,
    }
  }
}

/// Headroom on top of the longest a session request can legitimately hold
/// its claim.
const CLAIM_TTL_SLACK: Duration = Duration::from_secs(1);

impl ServiceConfig {
  /// Longest a live session request can hold an unattached claim: the claim
  /// write, the gateway call and the attach write, plus slack. A claim younger
  /// than this may still get its session.
  pub fn min_session_claim_ttl(&self) -> chrono::Duration {
    let busy = self
      .gateway_timeout
      .saturating_add(self.store_timeout.saturating_mul(2))
      .saturating_add(CLAIM_TTL_SLACK);
    chrono::Duration::from_std(busy).unwrap_or_else(|_| chrono::Duration::weeks(52))
  }

  /// `session_claim_ttl`, raised to the minimum when configured lower.
  pub fn effective_session_claim_ttl(&self) -> chrono::Duration {
    self.session_claim_ttl.max(self.min_session_claim_ttl())
  }
}

/// What `get-order-status` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStatusView {
  pub order_id: Uuid,
  pub order_number: String,
  pub status: OrderStatus,
  pub total: i64,
  pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderStatusView {
  fn from(order: &Order) -> Self {
    Self {
      order_id: order.id(),
      order_number: order.number().to_string(),
      status: order.status(),
      total: order.total(),
      updated_at: order.updated_at(),
    }
  }
}

/// Runs a storage call with the configured deadline.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> OrderResult<T>
where
  F: Future<Output = OrderResult<T>>,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(result) => result,
    Err(_) => {
      warn!(operation, limit_ms = limit.as_millis() as u64, "Operation timed out.");
      Err(OrderError::Timeout { operation })
    }
  }
}

#[derive(Clone)]
pub struct OrderService {
  orders: Arc<dyn OrderStore>,
  payments: Arc<dyn PaymentStore>,
  gateway: Arc<dyn PaymentGateway>,
  config: Arc<ServiceConfig>,
  checkout: Arc<Pipeline<CheckoutCtx, OrderError>>,
  payment_session: Arc<Pipeline<PaymentSessionCtx, OrderError>>,
}

impl OrderService {
  pub fn new(
    catalog: Arc<dyn Catalog>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: ServiceConfig,
  ) -> Self {
    if config.session_claim_ttl < config.min_session_claim_ttl() {
      warn!(
        configured_ms = config.session_claim_ttl.num_milliseconds(),
        effective_ms = config.min_session_claim_ttl().num_milliseconds(),
        "Session claim TTL is shorter than a session request can take; raising it."
      );
    }
    let config = Arc::new(config);
    let checkout = Arc::new(checkout::build_pipeline(catalog.clone(), orders.clone(), config.clone()));
    let payment_session = Arc::new(payment_session::build_pipeline(
      orders.clone(),
      payments.clone(),
      gateway.clone(),
      config.clone(),
    ));
    Self {
      orders,
      payments,
      gateway,
      config,
      checkout,
      payment_session,
    }
  }

  /// One store behind every port.
  pub fn with_store<S>(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, config: ServiceConfig) -> Self
  where
    S: Catalog + OrderStore + PaymentStore + 'static,
  {
    Self::new(store.clone(), store.clone(), store, gateway, config)
  }

  pub fn config(&self) -> &ServiceConfig {
    &self.config
  }

  async fn load_order(&self, order_id: Uuid) -> OrderResult<Order> {
    bounded(self.config.store_timeout, "load_order", self.orders.order(order_id))
      .await?
      .ok_or_else(|| OrderError::not_found("order", order_id))
  }

  #[instrument(name = "OrderService::order", skip(self, actor), fields(user_id = %actor.user_id))]
  pub async fn order(&self, actor: &Actor, order_id: Uuid) -> OrderResult<Order> {
    let order = self.load_order(order_id).await?;
    actor.ensure_can_view(&order)?;
    Ok(order)
  }

  pub async fn order_status(&self, actor: &Actor, order_id: Uuid) -> OrderResult<OrderStatusView> {
    let order = self.order(actor, order_id).await?;
    Ok(OrderStatusView::from(&order))
  }

  pub async fn order_by_number(&self, actor: &Actor, number: &str) -> OrderResult<Order> {
    let order = bounded(self.config.store_timeout, "order_by_number", self.orders.order_by_number(number))
      .await?
      .ok_or_else(|| OrderError::not_found("order", number))?;
    actor.ensure_can_view(&order)?;
    Ok(order)
  }

  /// The caller's own orders, newest first.
  pub async fn orders_for_user(&self, actor: &Actor, page: Page) -> OrderResult<Vec<Order>> {
    bounded(
      self.config.store_timeout,
      "orders_for_user",
      self.orders.orders_for_user(actor.user_id, page),
    )
    .await
  }

  /// User cancellation of a `PENDING` order. Gives the reservation back.
  #[instrument(name = "OrderService::cancel_order", skip(self, actor), fields(user_id = %actor.user_id))]
  pub async fn cancel_order(&self, actor: &Actor, order_id: Uuid) -> OrderResult<Order> {
    let order = self.load_order(order_id).await?;
    actor.ensure_can_view(&order)?;

    let canceled = bounded(
      self.config.store_timeout,
      "close_order",
      self.orders.close(order_id, CloseReason::UserCanceled, Utc::now()),
    )
    .await?;
    info!(order_number = %canceled.number(), "Order canceled by user.");
    Ok(canceled)
  }
}
