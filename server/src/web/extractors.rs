// storefront/src/web/extractors.rs

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use orderflow::Actor;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// The caller identified by an `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub is_admin: bool,
}

impl AuthenticatedUser {
  pub fn actor(&self) -> Actor {
    Actor {
      user_id: self.user_id,
      is_admin: self.is_admin,
    }
  }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not configured.".to_string()))?;

  let token = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .ok_or_else(|| AppError::Auth("Missing bearer token.".to_string()))?;

  let claims = state.tokens.verify(token)?;
  Ok(AuthenticatedUser {
    user_id: claims.sub,
    is_admin: claims.adm,
  })
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = authenticate(req);
    if let Err(e) = &result {
      warn!(path = %req.path(), error = %e, "Request rejected by bearer authentication.");
    }
    ready(result)
  }
}
