// storefront/src/models/mod.rs

//! Database row types and their conversions into `orderflow` domain values.

pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod user;

pub use order::OrderRow;
pub use order_item::OrderItemRow;
pub use payment::PaymentRow;
pub use product::ProductRow;
pub use user::User;

use orderflow::OrderError;

/// A row that cannot be turned back into a domain value.
pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> OrderError {
  OrderError::Storage {
    source: anyhow::anyhow!("corrupt {} row: {}", what, detail),
  }
}
