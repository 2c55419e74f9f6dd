// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::OrderError;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

/// Receives Midtrans HTTP notifications.
///
/// The raw body is handed over untouched; authentication happens in the
/// service before any field is trusted. Anything the gateway should not
/// retry (applied, duplicate, stale, unknown reference) is acknowledged
/// with 200. Rejected signatures get 401, and storage or timeout failures
/// surface as 5xx so the gateway delivers again.
#[instrument(name = "handler::midtrans_notification", skip(app_state, body), fields(bytes = body.len()))]
pub async fn midtrans_notification_handler(
  app_state: web::Data<AppState>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  match app_state.service.handle_notification(&body).await {
    Ok(outcome) => {
      info!(?outcome, "Notification handled.");
      Ok(HttpResponse::Ok().json(outcome))
    }
    Err(OrderError::NotFound { entity, key }) => {
      warn!(entity, %key, "Notification for an unknown payment acknowledged.");
      Ok(HttpResponse::Ok().json(json!({"outcome": "ignored", "reason": "unknown reference"})))
    }
    Err(e) => Err(e.into()),
  }
}
