// orderflow/src/domain/inventory.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub id: Uuid,
  pub sku: String,
  pub name: String,
  /// Whole currency units.
  pub price: i64,
  pub stock: i64,
  pub is_published: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
  pub product_id: Uuid,
  pub quantity: u32,
}

/// A product that could not cover the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
  pub product_id: Uuid,
  pub requested: u64,
  pub available: i64,
}

/// Sums the quantities of lines that name the same product, so an order with
/// two lines of one product is checked against its stock once.
pub fn aggregate(requests: &[StockRequest]) -> BTreeMap<Uuid, u64> {
  let mut totals = BTreeMap::new();
  for request in requests {
    *totals.entry(request.product_id).or_insert(0u64) += u64::from(request.quantity);
  }
  totals
}

/// All-or-nothing reservation check.
///
/// `stock_of` reads the current stock of a product (`None` for an unknown
/// product). On success returns the new stock level for every touched
/// product; on failure returns every shortfall and nothing must be applied.
pub fn reserve_all(
  requests: &[StockRequest],
  stock_of: impl Fn(Uuid) -> Option<i64>,
) -> Result<Vec<(Uuid, i64)>, Vec<Shortfall>> {
  let mut plan = Vec::new();
  let mut shortfalls = Vec::new();

  for (product_id, requested) in aggregate(requests) {
    let available = stock_of(product_id).unwrap_or(0);
    match i64::try_from(requested) {
      Ok(wanted) if available >= wanted => plan.push((product_id, available - wanted)),
      _ => shortfalls.push(Shortfall {
        product_id,
        requested,
        available,
      }),
    }
  }

  if shortfalls.is_empty() {
    Ok(plan)
  } else {
    Err(shortfalls)
  }
}
