// storefront/src/models/order.rs

use chrono::{DateTime, Utc};
use orderflow::{LineItem, Order, OrderError, OrderParts, OrderStatus, ShippingAddress};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{corrupt, OrderItemRow};

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Uuid,
  // Stored as text with a CHECK constraint rather than a Postgres enum.
  pub status: String,
  pub total_amount: i64,
  pub shipping_address: Json<ShippingAddress>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub stock_released_at: Option<DateTime<Utc>>,
}

impl OrderRow {
  /// Rebuilds the aggregate from its row and its items, in position order.
  pub fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, OrderError> {
    let status = self
      .status
      .parse::<OrderStatus>()
      .map_err(|e| corrupt("order", e))?;
    let items = items
      .into_iter()
      .map(LineItem::try_from)
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Order::restore(OrderParts {
      id: self.id,
      number: self.order_number,
      user_id: self.user_id,
      items,
      shipping: self.shipping_address.0,
      total: self.total_amount,
      status,
      notes: self.notes,
      created_at: self.created_at,
      updated_at: self.updated_at,
      stock_released_at: self.stock_released_at,
    }))
  }
}
