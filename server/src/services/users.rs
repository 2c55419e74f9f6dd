// storefront/src/services/users.rs

//! Account storage used by sign-up and sign-in.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::User;

#[async_trait]
pub trait UserDirectory: Send + Sync {
  /// Fails with `Conflict` when the email is already registered.
  async fn insert(&self, user: &User) -> Result<()>;

  async fn by_email(&self, email: &str) -> Result<Option<User>>;

  async fn by_id(&self, user_id: Uuid) -> Result<Option<User>>;
}

/// Emails are matched case-insensitively.
pub fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

/// In-process directory for tests and `PAYMENT_GATEWAY=mock` demos.
#[derive(Debug, Default)]
pub struct MemoryUsers {
  users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUsers {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
  async fn insert(&self, user: &User) -> Result<()> {
    let mut users = self.users.lock();
    if users.values().any(|u| u.email == user.email) {
      return Err(AppError::Conflict(format!("Email '{}' is already registered.", user.email)));
    }
    users.insert(user.id, user.clone());
    Ok(())
  }

  async fn by_email(&self, email: &str) -> Result<Option<User>> {
    let email = normalize_email(email);
    Ok(self.users.lock().values().find(|u| u.email == email).cloned())
  }

  async fn by_id(&self, user_id: Uuid) -> Result<Option<User>> {
    Ok(self.users.lock().get(&user_id).cloned())
  }
}
