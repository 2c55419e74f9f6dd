// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::CustomerDetails;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CreatePaymentPayload {
  pub order_id: Uuid,
}

#[derive(Deserialize, Debug, Default)]
pub struct StatusQuery {
  /// Ask the gateway before answering.
  #[serde(default)]
  pub refresh: bool,
}

#[instrument(
  name = "handler::create_payment",
  skip(app_state, auth_user, payload),
  fields(user_id = %auth_user.user_id, order_id = %payload.order_id)
)]
pub async fn create_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CreatePaymentPayload>,
) -> Result<HttpResponse, AppError> {
  let actor = auth_user.actor();
  let user = app_state
    .users
    .by_id(auth_user.user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
  let order = app_state.service.order(&actor, payload.order_id).await?;

  let customer = CustomerDetails {
    first_name: user.first_name().to_string(),
    email: user.email.clone(),
    phone: Some(order.shipping().phone.clone()).filter(|phone| !phone.trim().is_empty()),
  };
  let session = app_state
    .service
    .create_payment_session(&actor, order.id(), customer)
    .await?;

  let response = if session.reused {
    HttpResponse::Ok().json(&session)
  } else {
    HttpResponse::Created().json(&session)
  };
  Ok(response)
}

#[instrument(name = "handler::payment_status", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn payment_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
  let actor = auth_user.actor();
  let order_id = order_id.into_inner();
  let view = if query.refresh {
    app_state.service.refresh_payment_status(&actor, order_id).await?
  } else {
    app_state.service.payment_status(&actor, order_id).await?
  };
  Ok(HttpResponse::Ok().json(view))
}
