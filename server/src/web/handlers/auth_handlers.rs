// storefront/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::AuthSession;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct RegisterPayload {
  pub email: String,
  pub password: String,
  pub full_name: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginPayload {
  pub email: String,
  pub password: String,
}

fn session_body(session: &AuthSession) -> serde_json::Value {
  json!({
    "user": session.user,
    "token": session.token,
    "expires_at": session.expires_at,
  })
}

#[instrument(name = "handler::register", skip(app_state, payload), fields(email = %payload.email))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, AppError> {
  let RegisterPayload {
    email,
    password,
    full_name,
  } = payload.into_inner();
  let session = app_state.auth.signup(email, password, full_name).await?;
  info!(user_id = %session.user.id, "Account registered.");
  Ok(HttpResponse::Created().json(session_body(&session)))
}

#[instrument(name = "handler::login", skip(app_state, payload), fields(email = %payload.email))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, AppError> {
  let LoginPayload { email, password } = payload.into_inner();
  let session = app_state.auth.signin(email, password).await?;
  Ok(HttpResponse::Ok().json(session_body(&session)))
}
