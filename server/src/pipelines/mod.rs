// storefront/src/pipelines/mod.rs

//! Account workflows (sign-up and sign-in), built once at startup on the
//! `orderflow` pipeline engine. Order and payment workflows live in
//! `orderflow::OrderService`.

pub mod contexts;
pub mod signin_pipeline;
pub mod signup_pipeline;

use chrono::{DateTime, Utc};
use orderflow::{ContextData, Pipeline, WorkflowError, WorkflowOutcome};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::models::User;
use crate::services::tokens::TokenSigner;
use crate::services::users::UserDirectory;
use contexts::{SigninCtx, SignupCtx};

/// A signed-in user and the bearer token issued for them.
#[derive(Debug, Clone)]
pub struct AuthSession {
  pub user: User,
  pub token: String,
  pub expires_at: DateTime<Utc>,
}

pub struct AuthPipelines {
  signup: Pipeline<SignupCtx, AppError>,
  signin: Pipeline<SigninCtx, AppError>,
  tokens: Arc<TokenSigner>,
}

fn missing(step_name: &str, message: &str) -> AppError {
  WorkflowError::MissingState {
    step_name: step_name.to_string(),
    message: message.to_string(),
  }
  .into()
}

impl AuthPipelines {
  pub fn new(users: Arc<dyn UserDirectory>, tokens: Arc<TokenSigner>) -> Self {
    let signup = signup_pipeline::build_signup_pipeline(users.clone(), tokens.clone());
    let signin = signin_pipeline::build_signin_pipeline(users, tokens.clone());
    info!(
      signup_steps = signup.step_names().len(),
      signin_steps = signin.step_names().len(),
      "Account pipelines built."
    );
    Self { signup, signin, tokens }
  }

  fn session(&self, user: User, token: String) -> AuthSession {
    AuthSession {
      user,
      token,
      expires_at: Utc::now() + self.tokens.ttl(),
    }
  }

  #[instrument(name = "AuthPipelines::signup", skip_all)]
  pub async fn signup(&self, email: String, password: String, full_name: String) -> Result<AuthSession> {
    let ctx_data = ContextData::new(SignupCtx::new(email, password, full_name));
    if self.signup.run(ctx_data.clone()).await? == WorkflowOutcome::Stopped {
      return Err(missing("issue_token", "signup stopped before a user was created"));
    }
    let mut guard = ctx_data.write();
    let user = guard.created_user.take().ok_or_else(|| missing("create_user", "no user recorded"))?;
    let token = guard.token.take().ok_or_else(|| missing("issue_token", "no token issued"))?;
    Ok(self.session(user, token))
  }

  #[instrument(name = "AuthPipelines::signin", skip_all)]
  pub async fn signin(&self, email: String, password: String) -> Result<AuthSession> {
    let ctx_data = ContextData::new(SigninCtx::new(email, password));
    if self.signin.run(ctx_data.clone()).await? == WorkflowOutcome::Stopped {
      return Err(missing("issue_token", "signin stopped before a token was issued"));
    }
    let mut guard = ctx_data.write();
    let user = guard.user.take().ok_or_else(|| missing("fetch_user", "no user loaded"))?;
    let token = guard.token.take().ok_or_else(|| missing("issue_token", "no token issued"))?;
    Ok(self.session(user, token))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::users::MemoryUsers;
  use orderflow::OrderError;

  fn pipelines() -> AuthPipelines {
    let tokens = Arc::new(TokenSigner::new([7u8; 32], chrono::Duration::minutes(30)));
    AuthPipelines::new(Arc::new(MemoryUsers::new()), tokens)
  }

  #[tokio::test]
  async fn signup_then_signin_issues_verifiable_tokens() {
    let auth = pipelines();
    let created = auth
      .signup("  Budi@Example.com ".to_string(), "hunter2hunter2".to_string(), "Budi Santoso".to_string())
      .await
      .unwrap();
    assert_eq!(created.user.email, "budi@example.com");
    assert!(!created.user.is_admin);

    let session = auth
      .signin("BUDI@example.com".to_string(), "hunter2hunter2".to_string())
      .await
      .unwrap();
    assert_eq!(session.user.id, created.user.id);
    let claims = auth.tokens.verify(&session.token).unwrap();
    assert_eq!(claims.sub, created.user.id);
  }

  #[tokio::test]
  async fn duplicate_email_is_conflict() {
    let auth = pipelines();
    auth
      .signup("a@example.com".to_string(), "password-1".to_string(), "A".to_string())
      .await
      .unwrap();
    let again = auth
      .signup("A@example.com".to_string(), "password-2".to_string(), "A".to_string())
      .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
  }

  #[tokio::test]
  async fn invalid_signup_input_is_rejected() {
    let auth = pipelines();
    let short = auth
      .signup("a@example.com".to_string(), "short".to_string(), "A".to_string())
      .await;
    assert!(matches!(short, Err(AppError::Validation(_))));
    let nameless = auth
      .signup("a@example.com".to_string(), "long-enough".to_string(), "   ".to_string())
      .await;
    assert!(matches!(nameless, Err(AppError::Validation(_))));
  }

  #[tokio::test]
  async fn wrong_password_and_unknown_email_look_the_same() {
    let auth = pipelines();
    auth
      .signup("a@example.com".to_string(), "password-1".to_string(), "A".to_string())
      .await
      .unwrap();

    let wrong = auth.signin("a@example.com".to_string(), "password-2".to_string()).await;
    let unknown = auth.signin("b@example.com".to_string(), "password-1".to_string()).await;
    match (wrong, unknown) {
      (Err(AppError::Auth(a)), Err(AppError::Auth(b))) => assert_eq!(a, b),
      other => panic!("expected two auth errors, got {:?}", other),
    }
  }

  #[test]
  fn missing_state_maps_to_workflow_error() {
    let err = missing("issue_token", "no token issued");
    assert!(matches!(err, AppError::Order(OrderError::Workflow { .. })));
  }
}
