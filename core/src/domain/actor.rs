// orderflow/src/domain/actor.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::Order;
use crate::error::{OrderError, OrderResult};

/// The authenticated caller of an order or payment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id: Uuid,
  pub is_admin: bool,
}

impl Actor {
  pub fn customer(user_id: Uuid) -> Self {
    Self { user_id, is_admin: false }
  }

  pub fn admin(user_id: Uuid) -> Self {
    Self { user_id, is_admin: true }
  }

  /// Owners and admins may read an order.
  pub fn ensure_can_view(&self, order: &Order) -> OrderResult<()> {
    if self.is_admin || order.user_id() == self.user_id {
      Ok(())
    } else {
      Err(OrderError::Forbidden(format!("order {} belongs to another user", order.id())))
    }
  }

  /// Only the owner may pay for an order; owners and admins may cancel it.
  pub fn ensure_owner(&self, order: &Order) -> OrderResult<()> {
    if order.user_id() == self.user_id {
      Ok(())
    } else {
      Err(OrderError::Forbidden(format!("order {} belongs to another user", order.id())))
    }
  }
}
