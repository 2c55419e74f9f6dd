// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::{OrderError, WorkflowError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Order(#[from] OrderError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl From<WorkflowError> for AppError {
  fn from(err: WorkflowError) -> Self {
    AppError::Order(err.into())
  }
}

fn order_status(err: &OrderError) -> StatusCode {
  match err {
    OrderError::Validation(_) => StatusCode::BAD_REQUEST,
    OrderError::UnauthenticatedNotification { .. } => StatusCode::UNAUTHORIZED,
    OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
    OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
    OrderError::InsufficientStock { .. }
    | OrderError::InvalidTransition { .. }
    | OrderError::DuplicateNotification { .. }
    | OrderError::SessionInFlight { .. } => StatusCode::CONFLICT,
    OrderError::GatewayUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    OrderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    OrderError::Workflow { .. } | OrderError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn order_body(err: &OrderError) -> serde_json::Value {
  match err {
    OrderError::InsufficientStock { shortfalls } => json!({
      "error": err.to_string(),
      "shortfalls": shortfalls,
    }),
    OrderError::Workflow { .. } | OrderError::Storage { .. } => json!({"error": "An internal error occurred"}),
    other if other.is_retryable() => json!({"error": other.to_string(), "retryable": true}),
    other => json!({"error": other.to_string()}),
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Order(err) => order_status(err),
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }

    let body = match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) | AppError::Conflict(m) => {
        json!({"error": m})
      }
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Sqlx(_) => json!({"error": "Database operation failed"}),
      AppError::Order(err) => order_body(err),
      AppError::Internal(_) => json!({"error": "An internal error occurred"}),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
