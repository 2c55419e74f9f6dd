// storefront/src/models/order_item.rs

use orderflow::{LineItem, OrderError};
use sqlx::FromRow;
use uuid::Uuid;

use super::corrupt;

/// Line items are immutable once written; they carry no timestamps.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItemRow {
  pub order_id: Uuid,
  pub position: i32,
  pub product_id: Uuid,
  pub sku_snapshot: String,
  pub name_snapshot: String,
  pub price_snapshot: i64,
  pub quantity: i32,
}

impl OrderItemRow {
  pub fn from_line(order_id: Uuid, position: usize, item: &LineItem) -> Result<Self, OrderError> {
    Ok(Self {
      order_id,
      position: i32::try_from(position).map_err(|e| corrupt("order_item", e))?,
      product_id: item.product_id,
      sku_snapshot: item.sku.clone(),
      name_snapshot: item.name.clone(),
      price_snapshot: item.unit_price,
      quantity: i32::try_from(item.quantity).map_err(|e| corrupt("order_item", e))?,
    })
  }
}

impl TryFrom<OrderItemRow> for LineItem {
  type Error = OrderError;

  fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
    Ok(LineItem {
      product_id: row.product_id,
      sku: row.sku_snapshot,
      name: row.name_snapshot,
      quantity: u32::try_from(row.quantity).map_err(|e| corrupt("order_item", e))?,
      unit_price: row.price_snapshot,
    })
  }
}
