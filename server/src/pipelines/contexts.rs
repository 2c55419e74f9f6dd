// storefront/src/pipelines/contexts.rs

//! Data carried through the account pipelines. Handlers receive these
//! wrapped in `orderflow::ContextData`.

use crate::models::User;

/// Passwords never leave these structs except into the hasher, so neither
/// type derives `Debug`.
pub struct SignupCtx {
  pub email: String,
  pub password: String,
  pub full_name: String,
  pub created_user: Option<User>,
  pub token: Option<String>,
}

impl SignupCtx {
  pub fn new(email: String, password: String, full_name: String) -> Self {
    Self {
      email,
      password,
      full_name,
      created_user: None,
      token: None,
    }
  }
}

pub struct SigninCtx {
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub token: Option<String>,
}

impl SigninCtx {
  pub fn new(email: String, password: String) -> Self {
    Self {
      email,
      password,
      user: None,
      token: None,
    }
  }
}
