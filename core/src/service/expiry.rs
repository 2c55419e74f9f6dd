// orderflow/src/service/expiry.rs

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{bounded, OrderService};
use crate::domain::CloseReason;
use crate::error::{OrderError, OrderResult};

impl OrderService {
  /// Expires `PENDING` orders older than the payment window and gives their
  /// stock back. Returns the ids that were expired by this call.
  ///
  /// An order that was paid or canceled between the scan and the close is
  /// skipped; the store's guarded transition decides the race.
  #[instrument(name = "OrderService::expire_overdue", skip(self))]
  pub async fn expire_overdue(&self, now: DateTime<Utc>) -> OrderResult<Vec<Uuid>> {
    let cutoff = now - self.config.payment_window;
    let candidates = bounded(
      self.config.store_timeout,
      "overdue",
      self.orders.overdue(cutoff, self.config.expiry_batch_size),
    )
    .await?;

    let mut expired = Vec::with_capacity(candidates.len());
    for order_id in candidates {
      let closed = bounded(
        self.config.store_timeout,
        "close_order",
        self.orders.close(order_id, CloseReason::Expired, now),
      )
      .await;
      match closed {
        Ok(_) => expired.push(order_id),
        Err(OrderError::InvalidTransition { from, .. }) => {
          debug!(order_id = %order_id, status = %from, "Order closed elsewhere before expiry.");
        }
        Err(e) => warn!(order_id = %order_id, error = %e, "Failed to expire order."),
      }
    }

    if !expired.is_empty() {
      info!(count = expired.len(), "Expired overdue orders.");
    }
    Ok(expired)
  }
}
