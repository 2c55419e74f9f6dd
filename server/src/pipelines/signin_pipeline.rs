// storefront/src/pipelines/signin_pipeline.rs

use chrono::Utc;
use orderflow::{ContextData, Pipeline, StepControl};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::SigninCtx;
use crate::services::auth_service;
use crate::services::tokens::TokenSigner;
use crate::services::users::{normalize_email, UserDirectory};

// One message for unknown email and wrong password alike.
fn bad_credentials() -> AppError {
  AppError::Auth("Invalid email or password.".to_string())
}

pub fn build_signin_pipeline(users: Arc<dyn UserDirectory>, tokens: Arc<TokenSigner>) -> Pipeline<SigninCtx, AppError> {
  let mut p = Pipeline::<SigninCtx, AppError>::new(
    "signin",
    &[
      ("validate_signin_input", false),
      ("fetch_user", false),
      ("verify_password", false),
      ("issue_token", false),
    ],
  );

  p.on_step("validate_signin_input", |ctx_data: ContextData<SigninCtx>| async move {
    let mut guard = ctx_data.write();
    guard.email = normalize_email(&guard.email);
    if guard.email.is_empty() || guard.password.is_empty() {
      return Err(AppError::Validation("Email and password are required.".to_string()));
    }
    Ok::<_, AppError>(StepControl::Continue)
  });

  p.on_step("fetch_user", move |ctx_data: ContextData<SigninCtx>| {
    let users = users.clone();
    async move {
      let email = ctx_data.read().email.clone();
      match users.by_email(&email).await? {
        Some(user) => {
          ctx_data.write().user = Some(user);
          Ok::<_, AppError>(StepControl::Continue)
        }
        None => {
          warn!(%email, "Signin for unknown email.");
          Err(bad_credentials())
        }
      }
    }
  });

  p.on_step("verify_password", |ctx_data: ContextData<SigninCtx>| async move {
    let guard = ctx_data.read();
    let Some(user) = guard.user.as_ref() else {
      return Err(bad_credentials());
    };
    if !auth_service::verify_password(&user.password_hash, &guard.password)? {
      warn!(user_id = %user.id, "Signin with wrong password.");
      return Err(bad_credentials());
    }
    Ok::<_, AppError>(StepControl::Continue)
  });

  p.on_step("issue_token", move |ctx_data: ContextData<SigninCtx>| {
    let tokens = tokens.clone();
    async move {
      let mut guard = ctx_data.write();
      let Some((user_id, is_admin)) = guard.user.as_ref().map(|u| (u.id, u.is_admin)) else {
        return Err(bad_credentials());
      };
      guard.token = Some(tokens.issue(user_id, is_admin, Utc::now())?);
      info!(%user_id, "User signed in.");
      Ok::<_, AppError>(StepControl::Continue)
    }
  });

  p
}
