// storefront/src/pipelines/signup_pipeline.rs

use chrono::Utc;
use orderflow::{ContextData, Pipeline, StepControl};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::User;
use crate::pipelines::contexts::SignupCtx;
use crate::services::auth_service;
use crate::services::tokens::TokenSigner;
use crate::services::users::{normalize_email, UserDirectory};

const MAX_NAME_LEN: usize = 100;

pub fn build_signup_pipeline(users: Arc<dyn UserDirectory>, tokens: Arc<TokenSigner>) -> Pipeline<SignupCtx, AppError> {
  let mut p = Pipeline::<SignupCtx, AppError>::new(
    "signup",
    &[
      ("validate_signup_input", false),
      ("check_existing_user", false),
      ("create_user", false),
      ("issue_token", false),
    ],
  );

  p.on_step("validate_signup_input", |ctx_data: ContextData<SignupCtx>| async move {
    let mut guard = ctx_data.write();
    guard.email = normalize_email(&guard.email);
    guard.full_name = guard.full_name.trim().to_string();

    auth_service::validate_email(&guard.email)?;
    auth_service::validate_new_password(&guard.password)?;
    if guard.full_name.is_empty() || guard.full_name.chars().count() > MAX_NAME_LEN {
      return Err(AppError::Validation(format!(
        "Full name is required and must be at most {} characters.",
        MAX_NAME_LEN
      )));
    }
    debug!(email = %guard.email, "Signup input validated.");
    Ok::<_, AppError>(StepControl::Continue)
  });

  let lookup_users = users.clone();
  p.on_step("check_existing_user", move |ctx_data: ContextData<SignupCtx>| {
    let users = lookup_users.clone();
    async move {
      let email = ctx_data.read().email.clone();
      if users.by_email(&email).await?.is_some() {
        warn!(%email, "Signup with an already registered email.");
        return Err(AppError::Conflict("An account with this email already exists.".to_string()));
      }
      Ok::<_, AppError>(StepControl::Continue)
    }
  });

  p.on_step("create_user", move |ctx_data: ContextData<SignupCtx>| {
    let users = users.clone();
    async move {
      let (email, password, full_name) = {
        let guard = ctx_data.read();
        (guard.email.clone(), guard.password.clone(), guard.full_name.clone())
      };

      let now = Utc::now();
      let user = User {
        id: Uuid::new_v4(),
        email,
        full_name,
        password_hash: auth_service::hash_password(&password)?,
        is_admin: false,
        created_at: now,
        updated_at: now,
      };
      // A concurrent signup for the same email surfaces here as `Conflict`.
      users.insert(&user).await?;
      info!(user_id = %user.id, "User created.");
      ctx_data.write().created_user = Some(user);
      Ok::<_, AppError>(StepControl::Continue)
    }
  });

  p.on_step("issue_token", move |ctx_data: ContextData<SignupCtx>| {
    let tokens = tokens.clone();
    async move {
      let mut guard = ctx_data.write();
      let token = match guard.created_user.as_ref() {
        Some(user) => tokens.issue(user.id, user.is_admin, Utc::now())?,
        None => return Ok::<_, AppError>(StepControl::Stop),
      };
      guard.token = Some(token);
      Ok::<_, AppError>(StepControl::Continue)
    }
  });

  p
}
