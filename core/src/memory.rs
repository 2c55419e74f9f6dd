// orderflow/src/memory.rs

//! An in-process implementation of every storage port.
//!
//! All state sits behind one `parking_lot::Mutex`, which makes each port
//! method a single critical section. The guard is never held across an
//! `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::inventory::{self, Product};
use crate::domain::reconcile;
use crate::domain::{CloseReason, Order, OrderStatus, Payment, PaymentStatus, Reconciliation, VerifiedNotification};
use crate::error::{OrderError, OrderResult};
use crate::ports::{Catalog, OrderStore, Page, PaymentStore, SlotClaim};

#[derive(Debug, Default)]
struct State {
  products: HashMap<Uuid, Product>,
  orders: HashMap<Uuid, Order>,
  order_numbers: HashMap<String, Uuid>,
  payments: HashMap<Uuid, Payment>,
  references: HashMap<String, Uuid>,
}

impl State {
  fn restock(&mut self, order: &Order) {
    for (product_id, quantity) in inventory::aggregate(&order.stock_requests()) {
      if let Some(product) = self.products.get_mut(&product_id) {
        product.stock += i64::try_from(quantity).unwrap_or(i64::MAX);
      }
    }
  }

  fn active_payment(&self, order_id: Uuid) -> Option<&Payment> {
    self
      .payments
      .values()
      .find(|payment| payment.order_id == order_id && payment.is_active())
  }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put_product(&self, product: Product) {
    self.state.lock().products.insert(product.id, product);
  }

  /// Adds a published product and returns it.
  pub fn add_product(&self, sku: &str, name: &str, price: i64, stock: i64) -> Product {
    let product = Product {
      id: Uuid::new_v4(),
      sku: sku.to_string(),
      name: name.to_string(),
      price,
      stock,
      is_published: true,
    };
    self.put_product(product.clone());
    product
  }

  pub fn product(&self, product_id: Uuid) -> Option<Product> {
    self.state.lock().products.get(&product_id).cloned()
  }

  pub fn stock_of(&self, product_id: Uuid) -> Option<i64> {
    self.state.lock().products.get(&product_id).map(|p| p.stock)
  }

  pub fn order_count(&self) -> usize {
    self.state.lock().orders.len()
  }
}

#[async_trait]
impl Catalog for MemoryStore {
  async fn products(&self, ids: &[Uuid]) -> OrderResult<Vec<Product>> {
    let state = self.state.lock();
    Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  #[instrument(name = "MemoryStore::create_reserved", skip_all, fields(order_id = %order.id()))]
  async fn create_reserved(&self, order: Order) -> OrderResult<Order> {
    let mut state = self.state.lock();

    let plan = inventory::reserve_all(&order.stock_requests(), |id| {
      state.products.get(&id).filter(|p| p.is_published).map(|p| p.stock)
    })
    .map_err(|shortfalls| OrderError::InsufficientStock { shortfalls })?;

    for (product_id, new_stock) in plan {
      if let Some(product) = state.products.get_mut(&product_id) {
        product.stock = new_stock;
      }
    }
    state.order_numbers.insert(order.number().to_string(), order.id());
    state.orders.insert(order.id(), order.clone());
    debug!("Order recorded with reservation.");
    Ok(order)
  }

  async fn order(&self, order_id: Uuid) -> OrderResult<Option<Order>> {
    Ok(self.state.lock().orders.get(&order_id).cloned())
  }

  async fn order_by_number(&self, number: &str) -> OrderResult<Option<Order>> {
    let state = self.state.lock();
    Ok(
      state
        .order_numbers
        .get(number)
        .and_then(|id| state.orders.get(id))
        .cloned(),
    )
  }

  async fn orders_for_user(&self, user_id: Uuid, page: Page) -> OrderResult<Vec<Order>> {
    let state = self.state.lock();
    let mut orders: Vec<Order> = state.orders.values().filter(|o| o.user_id() == user_id).cloned().collect();
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Ok(
      orders
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect(),
    )
  }

  #[instrument(name = "MemoryStore::close", skip(self), fields(order_id = %order_id))]
  async fn close(&self, order_id: Uuid, reason: CloseReason, at: DateTime<Utc>) -> OrderResult<Order> {
    let mut state = self.state.lock();
    let mut order = state
      .orders
      .get(&order_id)
      .cloned()
      .ok_or_else(|| OrderError::not_found("order", order_id))?;

    if order.transition(reason.target(), at)? {
      state.restock(&order);
    }
    state.orders.insert(order_id, order.clone());
    Ok(order)
  }

  async fn overdue(&self, cutoff: DateTime<Utc>, limit: u32) -> OrderResult<Vec<Uuid>> {
    let state = self.state.lock();
    let mut overdue: Vec<&Order> = state
      .orders
      .values()
      .filter(|o| o.status() == OrderStatus::Pending && o.created_at() <= cutoff)
      .collect();
    overdue.sort_by_key(|o| o.created_at());
    Ok(overdue.into_iter().take(limit as usize).map(Order::id).collect())
  }
}

#[async_trait]
impl PaymentStore for MemoryStore {
  #[instrument(name = "MemoryStore::claim_slot", skip_all, fields(order_id = %payment.order_id, reference = %payment.reference))]
  async fn claim_slot(&self, payment: Payment, stale_before: DateTime<Utc>) -> OrderResult<SlotClaim> {
    let mut state = self.state.lock();

    let order_status = state
      .orders
      .get(&payment.order_id)
      .map(Order::status)
      .ok_or_else(|| OrderError::not_found("order", payment.order_id))?;
    if order_status != OrderStatus::Pending {
      return Err(OrderError::invalid_transition(order_status, "payment session"));
    }

    let mut abandoned = None;
    if let Some(active) = state.active_payment(payment.order_id) {
      if active.has_session() || active.created_at >= stale_before {
        return Ok(SlotClaim::Existing(active.clone()));
      }
      abandoned = Some(active.id);
    }

    if state.references.contains_key(&payment.reference) {
      return Err(OrderError::SessionInFlight {
        order_id: payment.order_id,
      });
    }

    if let Some(stale) = abandoned {
      if let Some(stale) = state.payments.get_mut(&stale) {
        debug!(payment_id = %stale.id, "Reclaiming abandoned payment slot.");
        stale.status = PaymentStatus::Failure;
        stale.updated_at = payment.created_at;
      }
    }

    state.references.insert(payment.reference.clone(), payment.id);
    state.payments.insert(payment.id, payment.clone());
    Ok(SlotClaim::Claimed(payment))
  }

  async fn attach_session(
    &self,
    payment_id: Uuid,
    token: &str,
    redirect_url: &str,
    raw: serde_json::Value,
  ) -> OrderResult<Payment> {
    let mut state = self.state.lock();
    let payment = state
      .payments
      .get_mut(&payment_id)
      .ok_or_else(|| OrderError::not_found("payment", payment_id))?;
    if payment.status != PaymentStatus::Pending || payment.has_session() {
      return Err(OrderError::invalid_transition(payment.status, "session attached"));
    }
    payment.token = Some(token.to_string());
    payment.redirect_url = Some(redirect_url.to_string());
    payment.raw_payload = Some(raw);
    payment.updated_at = Utc::now();
    Ok(payment.clone())
  }

  async fn release_slot(&self, payment_id: Uuid) -> OrderResult<()> {
    let mut state = self.state.lock();
    if let Some(payment) = state.payments.get_mut(&payment_id) {
      if !payment.has_session() && payment.status == PaymentStatus::Pending {
        payment.status = PaymentStatus::Failure;
        payment.updated_at = Utc::now();
      }
    }
    Ok(())
  }

  async fn payment_by_reference(&self, reference: &str) -> OrderResult<Option<Payment>> {
    let state = self.state.lock();
    Ok(
      state
        .references
        .get(reference)
        .and_then(|id| state.payments.get(id))
        .cloned(),
    )
  }

  async fn payments_for_order(&self, order_id: Uuid) -> OrderResult<Vec<Payment>> {
    let state = self.state.lock();
    let mut payments: Vec<Payment> = state.payments.values().filter(|p| p.order_id == order_id).cloned().collect();
    payments.sort_by(|a, b| b.attempt.cmp(&a.attempt));
    Ok(payments)
  }

  #[instrument(name = "MemoryStore::apply_notification", skip_all, fields(reference = %notice.reference, status = %notice.status))]
  async fn apply_notification(&self, notice: &VerifiedNotification, at: DateTime<Utc>) -> OrderResult<Reconciliation> {
    let mut state = self.state.lock();

    let mut payment = state
      .references
      .get(&notice.reference)
      .and_then(|id| state.payments.get(id))
      .cloned()
      .ok_or_else(|| OrderError::not_found("payment", &notice.reference))?;
    let mut order = state
      .orders
      .get(&payment.order_id)
      .cloned()
      .ok_or_else(|| OrderError::not_found("order", payment.order_id))?;

    let applied = reconcile::apply(&mut payment, &mut order, notice, at)?;

    if applied.release_stock {
      state.restock(&order);
    }
    state.payments.insert(payment.id, payment);
    state.orders.insert(order.id(), order);
    Ok(applied.reconciliation)
  }
}
