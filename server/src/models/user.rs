// storefront/src/models/user.rs

use chrono::{DateTime, Utc};
use orderflow::Actor;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  pub full_name: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub is_admin: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn actor(&self) -> Actor {
    Actor {
      user_id: self.id,
      is_admin: self.is_admin,
    }
  }

  /// First word of the full name, as the gateway wants it.
  pub fn first_name(&self) -> &str {
    self.full_name.split_whitespace().next().unwrap_or("Customer")
  }
}
