// storefront/src/models/payment.rs

use chrono::{DateTime, Utc};
use orderflow::{OrderError, Payment, PaymentStatus};
use sqlx::FromRow;
use uuid::Uuid;

use super::corrupt;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub reference: String,
  pub attempt: i32,
  pub token: Option<String>,
  pub redirect_url: Option<String>,
  pub gateway_transaction_id: Option<String>,
  pub payment_type: Option<String>,
  pub amount: i64,
  pub status: String,
  pub raw_payload: Option<serde_json::Value>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
  type Error = OrderError;

  fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
    Ok(Payment {
      id: row.id,
      order_id: row.order_id,
      reference: row.reference,
      attempt: row.attempt,
      token: row.token,
      redirect_url: row.redirect_url,
      gateway_transaction_id: row.gateway_transaction_id,
      payment_type: row.payment_type,
      amount: row.amount,
      status: row.status.parse::<PaymentStatus>().map_err(|e| corrupt("payment", e))?,
      raw_payload: row.raw_payload,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}
