// orderflow/src/domain/order.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::inventory::StockRequest;
use crate::error::{OrderError, OrderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  /// Created, stock reserved, awaiting payment.
  Pending,
  Paid,
  Canceled,
  Expired,
}

impl OrderStatus {
  pub const fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Paid => "PAID",
      OrderStatus::Canceled => "CANCELED",
      OrderStatus::Expired => "EXPIRED",
    }
  }

  pub const fn is_terminal(&self) -> bool {
    !matches!(self, OrderStatus::Pending)
  }

  /// Only `PENDING` may move, and only to one of the terminal states.
  pub const fn can_transition(&self, to: OrderStatus) -> bool {
    matches!(
      (self, to),
      (OrderStatus::Pending, OrderStatus::Paid)
        | (OrderStatus::Pending, OrderStatus::Canceled)
        | (OrderStatus::Pending, OrderStatus::Expired)
    )
  }

  /// Entering this state gives the reserved stock back.
  pub const fn releases_stock(&self) -> bool {
    matches!(self, OrderStatus::Canceled | OrderStatus::Expired)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = OrderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "PENDING" => Ok(OrderStatus::Pending),
      "PAID" => Ok(OrderStatus::Paid),
      "CANCELED" => Ok(OrderStatus::Canceled),
      "EXPIRED" => Ok(OrderStatus::Expired),
      other => Err(OrderError::Validation(format!("unknown order status '{}'", other))),
    }
  }
}

/// Why an order is being closed without payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
  UserCanceled,
  PaymentFailed,
  Expired,
}

impl CloseReason {
  pub const fn target(&self) -> OrderStatus {
    match self {
      CloseReason::UserCanceled | CloseReason::PaymentFailed => OrderStatus::Canceled,
      CloseReason::Expired => OrderStatus::Expired,
    }
  }
}

/// A line item with product data captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
  pub product_id: Uuid,
  pub sku: String,
  pub name: String,
  pub quantity: u32,
  /// Whole currency units.
  pub unit_price: i64,
}

impl LineItem {
  pub fn subtotal(&self) -> Option<i64> {
    self.unit_price.checked_mul(i64::from(self.quantity))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub full_name: String,
  pub phone: String,
  pub address: String,
  pub city: String,
  pub postal_code: String,
}

impl ShippingAddress {
  pub fn validate(&self) -> OrderResult<()> {
    if self.full_name.trim().is_empty() {
      return Err(OrderError::Validation("shipping full_name is required".to_string()));
    }
    if self.address.trim().is_empty() {
      return Err(OrderError::Validation("shipping address is required".to_string()));
    }
    Ok(())
  }
}

/// Every field of an [`Order`], for adapters rebuilding one from storage.
#[derive(Debug, Clone)]
pub struct OrderParts {
  pub id: Uuid,
  pub number: String,
  pub user_id: Uuid,
  pub items: Vec<LineItem>,
  pub shipping: ShippingAddress,
  pub total: i64,
  pub status: OrderStatus,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub stock_released_at: Option<DateTime<Utc>>,
}

/// The order aggregate. Items and captured prices have no mutators; only the
/// status (and its timestamps) ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
  id: Uuid,
  number: String,
  user_id: Uuid,
  items: Vec<LineItem>,
  shipping: ShippingAddress,
  total: i64,
  status: OrderStatus,
  notes: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  stock_released_at: Option<DateTime<Utc>>,
}

impl Order {
  /// Builds a new `PENDING` order. The total is computed from the captured
  /// prices with overflow checks.
  pub fn new(
    user_id: Uuid,
    items: Vec<LineItem>,
    shipping: ShippingAddress,
    notes: Option<String>,
    now: DateTime<Utc>,
  ) -> OrderResult<Self> {
    if items.is_empty() {
      return Err(OrderError::Validation("order must have at least one item".to_string()));
    }
    let total = items
      .iter()
      .try_fold(0i64, |acc, item| item.subtotal().and_then(|s| acc.checked_add(s)))
      .ok_or_else(|| OrderError::Validation("order total overflows".to_string()))?;

    Ok(Self {
      id: Uuid::new_v4(),
      number: generate_order_number(now),
      user_id,
      items,
      shipping,
      total,
      status: OrderStatus::Pending,
      notes,
      created_at: now,
      updated_at: now,
      stock_released_at: None,
    })
  }

  pub fn restore(parts: OrderParts) -> Self {
    Self {
      id: parts.id,
      number: parts.number,
      user_id: parts.user_id,
      items: parts.items,
      shipping: parts.shipping,
      total: parts.total,
      status: parts.status,
      notes: parts.notes,
      created_at: parts.created_at,
      updated_at: parts.updated_at,
      stock_released_at: parts.stock_released_at,
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn number(&self) -> &str {
    &self.number
  }

  pub fn user_id(&self) -> Uuid {
    self.user_id
  }

  pub fn items(&self) -> &[LineItem] {
    &self.items
  }

  pub fn shipping(&self) -> &ShippingAddress {
    &self.shipping
  }

  pub fn total(&self) -> i64 {
    self.total
  }

  pub fn status(&self) -> OrderStatus {
    self.status
  }

  pub fn notes(&self) -> Option<&str> {
    self.notes.as_deref()
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  pub fn stock_released_at(&self) -> Option<DateTime<Utc>> {
    self.stock_released_at
  }

  /// The reservation this order holds, one request per line.
  pub fn stock_requests(&self) -> Vec<StockRequest> {
    self
      .items
      .iter()
      .map(|item| StockRequest {
        product_id: item.product_id,
        quantity: item.quantity,
      })
      .collect()
  }

  pub fn is_overdue(&self, now: DateTime<Utc>, window: Duration) -> bool {
    self.status == OrderStatus::Pending && self.created_at + window <= now
  }

  /// Applies a guarded status change.
  ///
  /// Returns `true` when the caller must give the reserved stock back. That
  /// happens at most once per order: the release marker is set here, in the
  /// same step as the transition.
  pub fn transition(&mut self, to: OrderStatus, at: DateTime<Utc>) -> OrderResult<bool> {
    if !self.status.can_transition(to) {
      return Err(OrderError::invalid_transition(self.status, to));
    }
    self.status = to;
    self.updated_at = at;

    if to.releases_stock() && self.stock_released_at.is_none() {
      self.stock_released_at = Some(at);
      return Ok(true);
    }
    Ok(false)
  }
}

/// `ORD-YYYYMMDD-XXXXXXXX` with eight random upper-case hex digits.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
  let random = Uuid::new_v4().simple().to_string();
  let suffix: String = random.chars().take(8).collect::<String>().to_uppercase();
  format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(quantity: u32, unit_price: i64) -> LineItem {
    LineItem {
      product_id: Uuid::new_v4(),
      sku: "SKU-1".to_string(),
      name: "Diecast 1:64".to_string(),
      quantity,
      unit_price,
    }
  }

  fn pending() -> Order {
    Order::new(Uuid::new_v4(), vec![item(2, 150), item(1, 300)], ShippingAddress::default(), None, Utc::now()).unwrap()
  }

  #[test]
  fn total_is_sum_of_captured_prices() {
    assert_eq!(pending().total(), 600);
  }

  #[test]
  fn empty_order_is_rejected() {
    let err = Order::new(Uuid::new_v4(), vec![], ShippingAddress::default(), None, Utc::now()).unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
  }

  #[test]
  fn overflowing_total_is_rejected() {
    let err = Order::new(Uuid::new_v4(), vec![item(2, i64::MAX)], ShippingAddress::default(), None, Utc::now())
      .unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
  }

  #[test]
  fn pending_moves_to_each_terminal_state_once() {
    for target in [OrderStatus::Paid, OrderStatus::Canceled, OrderStatus::Expired] {
      let mut order = pending();
      let release = order.transition(target, Utc::now()).unwrap();
      assert_eq!(release, target.releases_stock());
      assert_eq!(order.status(), target);

      for next in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Canceled, OrderStatus::Expired] {
        let before = order.clone();
        let err = order.transition(next, Utc::now()).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        assert_eq!(order, before, "failed transition must not mutate");
      }
    }
  }

  #[test]
  fn pending_to_pending_is_invalid() {
    let mut order = pending();
    assert!(order.transition(OrderStatus::Pending, Utc::now()).is_err());
  }

  #[test]
  fn order_number_has_expected_shape() {
    let number = generate_order_number(Utc::now());
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "ORD");
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), 8);
    assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
  }

  #[test]
  fn overdue_only_while_pending() {
    let mut order = pending();
    let later = order.created_at() + Duration::minutes(61);
    assert!(order.is_overdue(later, Duration::minutes(60)));
    assert!(!order.is_overdue(order.created_at() + Duration::minutes(59), Duration::minutes(60)));
    order.transition(OrderStatus::Paid, later).unwrap();
    assert!(!order.is_overdue(later, Duration::minutes(60)));
  }

  #[test]
  fn status_round_trips_through_str() {
    for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Canceled, OrderStatus::Expired] {
      assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
    }
    assert!("SHIPPING".parse::<OrderStatus>().is_err());
  }
}
