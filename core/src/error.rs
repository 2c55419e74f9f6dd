// orderflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::inventory::Shortfall;

#[derive(Debug, Error)]
pub enum OrderError {
  /// One or more line items could not be reserved. Nothing was persisted.
  #[error("Insufficient stock for {} product(s)", shortfalls.len())]
  InsufficientStock { shortfalls: Vec<Shortfall> },

  #[error("Invalid transition from {from} to {to}")]
  InvalidTransition { from: String, to: String },

  #[error("Notification rejected: {reason}")]
  UnauthenticatedNotification { reason: String },

  #[error("Notification already applied for reference '{reference}' with status {status}")]
  DuplicateNotification { reference: String, status: String },

  #[error("Payment gateway unavailable: {message}")]
  GatewayUnavailable { message: String },

  /// Another request is creating the payment session for this order right now.
  #[error("Payment session for order {order_id} is being created")]
  SessionInFlight { order_id: Uuid },

  #[error("{entity} not found: {key}")]
  NotFound { entity: &'static str, key: String },

  #[error("Not allowed: {0}")]
  Forbidden(String),

  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("Operation '{operation}' timed out")]
  Timeout { operation: &'static str },

  #[error("Workflow step '{step_name}' failed: {message}")]
  Workflow { step_name: String, message: String },

  #[error("Storage error: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },
}

impl OrderError {
  pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
    OrderError::NotFound {
      entity,
      key: key.to_string(),
    }
  }

  pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
    OrderError::InvalidTransition {
      from: from.to_string(),
      to: to.to_string(),
    }
  }

  pub fn rejected(reason: impl Into<String>) -> Self {
    OrderError::UnauthenticatedNotification { reason: reason.into() }
  }

  /// Errors the caller may retry without changing the request.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      OrderError::GatewayUnavailable { .. } | OrderError::SessionInFlight { .. } | OrderError::Timeout { .. }
    )
  }
}

impl From<AnyhowError> for OrderError {
  fn from(err: AnyhowError) -> Self {
    // Keep domain errors that travelled through an adapter as-is.
    match err.downcast::<OrderError>() {
      Ok(order_err) => order_err,
      Err(other) => OrderError::Storage { source: other },
    }
  }
}

pub type OrderResult<T, E = OrderError> = std::result::Result<T, E>;
