// storefront/src/db/pg_store.rs

//! `PgStore`: the storage ports over PostgreSQL.
//!
//! Every mutating method runs in one transaction. Order rows are locked
//! with `SELECT … FOR UPDATE` before their payments, so close, claim and
//! reconcile serialize per order. Stock moves through guarded
//! `UPDATE … WHERE stock >= n` statements, taken in product-id order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderflow::domain::{inventory, reconcile};
use orderflow::{
  Catalog, CloseReason, Order, OrderError, OrderResult, OrderStatus, OrderStore, Page, Payment, PaymentStore,
  Product, Reconciliation, Shortfall, SlotClaim, VerifiedNotification,
};
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{corrupt, OrderItemRow, OrderRow, PaymentRow, ProductRow, User};
use crate::services::users::{normalize_email, UserDirectory};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, total_amount, shipping_address, notes, \
  created_at, updated_at, stock_released_at";
const ITEM_COLUMNS: &str = "order_id, position, product_id, sku_snapshot, name_snapshot, price_snapshot, quantity";
const PAYMENT_COLUMNS: &str = "id, order_id, reference, attempt, token, redirect_url, gateway_transaction_id, \
  payment_type, amount, status, raw_payload, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, full_name, password_hash, is_admin, created_at, updated_at";

fn storage(err: sqlx::Error) -> OrderError {
  OrderError::Storage { source: err.into() }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
  err
    .as_database_error()
    .map_or(false, |db_err| db_err.is_unique_violation())
}

#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  pub async fn ping(&self) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }

  async fn payment_by_id(&self, payment_id: Uuid) -> OrderResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
    sqlx::query_as::<_, PaymentRow>(&sql)
      .bind(payment_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(storage)?
      .map(Payment::try_from)
      .transpose()
  }
}

/// Attaches items to their order rows, preserving row order.
async fn hydrate(conn: &mut PgConnection, rows: Vec<OrderRow>) -> OrderResult<Vec<Order>> {
  if rows.is_empty() {
    return Ok(Vec::new());
  }
  let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
  let sql = format!(
    "SELECT {} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
    ITEM_COLUMNS
  );
  let items: Vec<OrderItemRow> = sqlx::query_as(&sql)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage)?;

  let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
  for item in items {
    by_order.entry(item.order_id).or_default().push(item);
  }
  rows
    .into_iter()
    .map(|row| {
      let items = by_order.remove(&row.id).unwrap_or_default();
      row.into_order(items)
    })
    .collect()
}

async fn load_order(conn: &mut PgConnection, order_id: Uuid, for_update: bool) -> OrderResult<Option<Order>> {
  let sql = format!(
    "SELECT {} FROM orders WHERE id = $1{}",
    ORDER_COLUMNS,
    if for_update { " FOR UPDATE" } else { "" }
  );
  let row: Option<OrderRow> = sqlx::query_as(&sql)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage)?;
  match row {
    Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
    None => Ok(None),
  }
}

async fn restock(conn: &mut PgConnection, order: &Order) -> OrderResult<()> {
  for (product_id, quantity) in inventory::aggregate(&order.stock_requests()) {
    let quantity = i64::try_from(quantity).map_err(|e| corrupt("order_item", e))?;
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
      .bind(product_id)
      .bind(quantity)
      .execute(&mut *conn)
      .await
      .map_err(storage)?;
  }
  debug!(order_id = %order.id(), "Reserved stock returned.");
  Ok(())
}

async fn save_order_status(conn: &mut PgConnection, order: &Order) -> OrderResult<()> {
  sqlx::query("UPDATE orders SET status = $2, updated_at = $3, stock_released_at = $4 WHERE id = $1")
    .bind(order.id())
    .bind(order.status().as_str())
    .bind(order.updated_at())
    .bind(order.stock_released_at())
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
  Ok(())
}

#[async_trait]
impl Catalog for PgStore {
  async fn products(&self, ids: &[Uuid]) -> OrderResult<Vec<Product>> {
    let rows: Vec<ProductRow> =
      sqlx::query_as("SELECT id, sku, name, price, stock, is_published FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
    Ok(rows.into_iter().map(Product::from).collect())
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "PgStore::create_reserved", skip_all, fields(order_id = %order.id()))]
  async fn create_reserved(&self, order: Order) -> OrderResult<Order> {
    let mut tx = self.pool.begin().await.map_err(storage)?;

    let mut shortfalls = Vec::new();
    for (product_id, requested) in inventory::aggregate(&order.stock_requests()) {
      let wanted = i64::try_from(requested).unwrap_or(i64::MAX);
      let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE products SET stock = stock - $2, updated_at = now() \
         WHERE id = $1 AND is_published AND stock >= $2 RETURNING stock",
      )
      .bind(product_id)
      .bind(wanted)
      .fetch_optional(&mut *tx)
      .await
      .map_err(storage)?;

      if remaining.is_none() {
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 AND is_published")
          .bind(product_id)
          .fetch_optional(&mut *tx)
          .await
          .map_err(storage)?;
        shortfalls.push(Shortfall {
          product_id,
          requested,
          available: available.unwrap_or(0),
        });
      }
    }
    if !shortfalls.is_empty() {
      tx.rollback().await.map_err(storage)?;
      return Err(OrderError::InsufficientStock { shortfalls });
    }

    sqlx::query(
      "INSERT INTO orders (id, order_number, user_id, status, total_amount, shipping_address, notes, \
       created_at, updated_at, stock_released_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(order.id())
    .bind(order.number())
    .bind(order.user_id())
    .bind(order.status().as_str())
    .bind(order.total())
    .bind(Json(order.shipping().clone()))
    .bind(order.notes())
    .bind(order.created_at())
    .bind(order.updated_at())
    .bind(order.stock_released_at())
    .execute(&mut *tx)
    .await
    .map_err(storage)?;

    for (position, item) in order.items().iter().enumerate() {
      let row = OrderItemRow::from_line(order.id(), position, item)?;
      sqlx::query(
        "INSERT INTO order_items (order_id, position, product_id, sku_snapshot, name_snapshot, price_snapshot, quantity) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
      )
      .bind(row.order_id)
      .bind(row.position)
      .bind(row.product_id)
      .bind(row.sku_snapshot)
      .bind(row.name_snapshot)
      .bind(row.price_snapshot)
      .bind(row.quantity)
      .execute(&mut *tx)
      .await
      .map_err(storage)?;
    }

    tx.commit().await.map_err(storage)?;
    debug!("Order recorded with reservation.");
    Ok(order)
  }

  async fn order(&self, order_id: Uuid) -> OrderResult<Option<Order>> {
    let mut conn = self.pool.acquire().await.map_err(storage)?;
    load_order(&mut conn, order_id, false).await
  }

  async fn order_by_number(&self, number: &str) -> OrderResult<Option<Order>> {
    let mut conn = self.pool.acquire().await.map_err(storage)?;
    let sql = format!("SELECT {} FROM orders WHERE order_number = $1", ORDER_COLUMNS);
    let row: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(number)
      .fetch_optional(&mut *conn)
      .await
      .map_err(storage)?;
    match row {
      Some(row) => Ok(hydrate(&mut conn, vec![row]).await?.pop()),
      None => Ok(None),
    }
  }

  async fn orders_for_user(&self, user_id: Uuid, page: Page) -> OrderResult<Vec<Order>> {
    let mut conn = self.pool.acquire().await.map_err(storage)?;
    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
      ORDER_COLUMNS
    );
    let rows: Vec<OrderRow> = sqlx::query_as(&sql)
      .bind(user_id)
      .bind(i64::from(page.limit))
      .bind(i64::from(page.offset))
      .fetch_all(&mut *conn)
      .await
      .map_err(storage)?;
    hydrate(&mut conn, rows).await
  }

  #[instrument(name = "PgStore::close", skip(self), fields(order_id = %order_id))]
  async fn close(&self, order_id: Uuid, reason: CloseReason, at: DateTime<Utc>) -> OrderResult<Order> {
    let mut tx = self.pool.begin().await.map_err(storage)?;
    let mut order = load_order(&mut tx, order_id, true)
      .await?
      .ok_or_else(|| OrderError::not_found("order", order_id))?;

    // A failed transition drops the transaction, which rolls it back.
    if order.transition(reason.target(), at)? {
      restock(&mut tx, &order).await?;
    }
    save_order_status(&mut tx, &order).await?;
    tx.commit().await.map_err(storage)?;
    Ok(order)
  }

  async fn overdue(&self, cutoff: DateTime<Utc>, limit: u32) -> OrderResult<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
      "SELECT id FROM orders WHERE status = 'PENDING' AND created_at <= $1 ORDER BY created_at LIMIT $2",
    )
    .bind(cutoff)
    .bind(i64::from(limit))
    .fetch_all(&self.pool)
    .await
    .map_err(storage)
  }
}

#[async_trait]
impl PaymentStore for PgStore {
  #[instrument(name = "PgStore::claim_slot", skip_all, fields(order_id = %payment.order_id, reference = %payment.reference))]
  async fn claim_slot(&self, payment: Payment, stale_before: DateTime<Utc>) -> OrderResult<SlotClaim> {
    let mut tx = self.pool.begin().await.map_err(storage)?;

    let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
      .bind(payment.order_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(storage)?;
    let status = status
      .ok_or_else(|| OrderError::not_found("order", payment.order_id))?
      .parse::<OrderStatus>()
      .map_err(|e| corrupt("order", e))?;
    if status != OrderStatus::Pending {
      return Err(OrderError::invalid_transition(status, "payment session"));
    }

    let sql = format!(
      "SELECT {} FROM payments WHERE order_id = $1 AND status IN ('pending', 'capture') FOR UPDATE",
      PAYMENT_COLUMNS
    );
    let active: Option<PaymentRow> = sqlx::query_as(&sql)
      .bind(payment.order_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(storage)?;
    let mut abandoned = None;
    if let Some(active) = active.map(Payment::try_from).transpose()? {
      if active.has_session() || active.created_at >= stale_before {
        return Ok(SlotClaim::Existing(active));
      }
      abandoned = Some(active.id);
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payments WHERE reference = $1)")
      .bind(&payment.reference)
      .fetch_one(&mut *tx)
      .await
      .map_err(storage)?;
    if taken {
      return Err(OrderError::SessionInFlight {
        order_id: payment.order_id,
      });
    }

    if let Some(stale_id) = abandoned {
      debug!(payment_id = %stale_id, "Reclaiming abandoned payment slot.");
      sqlx::query("UPDATE payments SET status = 'failure', updated_at = $2 WHERE id = $1")
        .bind(stale_id)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
    }

    sqlx::query(
      "INSERT INTO payments (id, order_id, reference, attempt, token, redirect_url, gateway_transaction_id, \
       payment_type, amount, status, raw_payload, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(&payment.reference)
    .bind(payment.attempt)
    .bind(&payment.token)
    .bind(&payment.redirect_url)
    .bind(&payment.gateway_transaction_id)
    .bind(&payment.payment_type)
    .bind(payment.amount)
    .bind(payment.status.as_str())
    .bind(&payment.raw_payload)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        OrderError::SessionInFlight {
          order_id: payment.order_id,
        }
      } else {
        storage(e)
      }
    })?;

    tx.commit().await.map_err(storage)?;
    Ok(SlotClaim::Claimed(payment))
  }

  async fn attach_session(
    &self,
    payment_id: Uuid,
    token: &str,
    redirect_url: &str,
    raw: serde_json::Value,
  ) -> OrderResult<Payment> {
    let sql = format!(
      "UPDATE payments SET token = $2, redirect_url = $3, raw_payload = $4, updated_at = $5 \
       WHERE id = $1 AND status = 'pending' AND token IS NULL RETURNING {}",
      PAYMENT_COLUMNS
    );
    let row: Option<PaymentRow> = sqlx::query_as(&sql)
      .bind(payment_id)
      .bind(token)
      .bind(redirect_url)
      .bind(raw)
      .bind(Utc::now())
      .fetch_optional(&self.pool)
      .await
      .map_err(storage)?;

    match row {
      Some(row) => Payment::try_from(row),
      None => match self.payment_by_id(payment_id).await? {
        Some(current) => Err(OrderError::invalid_transition(current.status, "session attached")),
        None => Err(OrderError::not_found("payment", payment_id)),
      },
    }
  }

  async fn release_slot(&self, payment_id: Uuid) -> OrderResult<()> {
    sqlx::query(
      "UPDATE payments SET status = 'failure', updated_at = now() \
       WHERE id = $1 AND status = 'pending' AND token IS NULL",
    )
    .bind(payment_id)
    .execute(&self.pool)
    .await
    .map_err(storage)?;
    Ok(())
  }

  async fn payment_by_reference(&self, reference: &str) -> OrderResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE reference = $1", PAYMENT_COLUMNS);
    sqlx::query_as::<_, PaymentRow>(&sql)
      .bind(reference)
      .fetch_optional(&self.pool)
      .await
      .map_err(storage)?
      .map(Payment::try_from)
      .transpose()
  }

  async fn payments_for_order(&self, order_id: Uuid) -> OrderResult<Vec<Payment>> {
    let sql = format!(
      "SELECT {} FROM payments WHERE order_id = $1 ORDER BY attempt DESC",
      PAYMENT_COLUMNS
    );
    let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
      .bind(order_id)
      .fetch_all(&self.pool)
      .await
      .map_err(storage)?;
    rows.into_iter().map(Payment::try_from).collect()
  }

  #[instrument(name = "PgStore::apply_notification", skip_all, fields(reference = %notice.reference, status = %notice.status))]
  async fn apply_notification(&self, notice: &VerifiedNotification, at: DateTime<Utc>) -> OrderResult<Reconciliation> {
    let mut tx = self.pool.begin().await.map_err(storage)?;

    let order_id: Option<Uuid> = sqlx::query_scalar("SELECT order_id FROM payments WHERE reference = $1")
      .bind(&notice.reference)
      .fetch_optional(&mut *tx)
      .await
      .map_err(storage)?;
    let order_id = order_id.ok_or_else(|| OrderError::not_found("payment", &notice.reference))?;

    // Order first, then payment: the same lock order as close and claim_slot.
    let mut order = load_order(&mut tx, order_id, true)
      .await?
      .ok_or_else(|| OrderError::not_found("order", order_id))?;
    let sql = format!("SELECT {} FROM payments WHERE reference = $1 FOR UPDATE", PAYMENT_COLUMNS);
    let row: PaymentRow = sqlx::query_as(&sql)
      .bind(&notice.reference)
      .fetch_one(&mut *tx)
      .await
      .map_err(storage)?;
    let mut payment = Payment::try_from(row)?;

    let status_before = order.status();
    let applied = reconcile::apply(&mut payment, &mut order, notice, at)?;

    if applied.release_stock {
      restock(&mut tx, &order).await?;
    }
    if order.status() != status_before {
      save_order_status(&mut tx, &order).await?;
    }
    sqlx::query(
      "UPDATE payments SET status = $2, gateway_transaction_id = $3, payment_type = $4, raw_payload = $5, \
       updated_at = $6 WHERE id = $1",
    )
    .bind(payment.id)
    .bind(payment.status.as_str())
    .bind(&payment.gateway_transaction_id)
    .bind(&payment.payment_type)
    .bind(&payment.raw_payload)
    .bind(payment.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(storage)?;

    tx.commit().await.map_err(storage)?;
    Ok(applied.reconciliation)
  }
}

#[async_trait]
impl UserDirectory for PgStore {
  async fn insert(&self, user: &User) -> AppResult<()> {
    sqlx::query(
      "INSERT INTO users (id, email, full_name, password_hash, is_admin, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| {
      if is_unique_violation(&e) {
        AppError::Conflict(format!("Email '{}' is already registered.", user.email))
      } else {
        AppError::Sqlx(e)
      }
    })?;
    Ok(())
  }

  async fn by_email(&self, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
    Ok(
      sqlx::query_as::<_, User>(&sql)
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(user_id).fetch_optional(&self.pool).await?)
  }
}
