// orderflow/src/service/reconciler.rs

//! Applies asynchronous gateway notifications to local state.

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::{bounded, OrderService};
use crate::domain::{Reconciliation, VerifiedNotification};
use crate::error::{OrderError, OrderResult};

impl OrderService {
  /// Entry point for a raw notification body.
  ///
  /// Nothing is read from the payload before its signature checks out.
  /// Re-deliveries and out-of-order older statuses are absorbed as
  /// `Duplicate` / `Stale` outcomes without touching state.
  #[instrument(name = "OrderService::handle_notification", skip_all, fields(bytes = raw_body.len()))]
  pub async fn handle_notification(&self, raw_body: &[u8]) -> OrderResult<Reconciliation> {
    let notice = self.gateway.verify_notification(raw_body)?;
    self.reconcile(notice).await
  }

  #[instrument(name = "OrderService::reconcile", skip_all, fields(reference = %notice.reference, status = %notice.status))]
  pub(crate) async fn reconcile(&self, notice: VerifiedNotification) -> OrderResult<Reconciliation> {
    let applied = bounded(
      self.config.store_timeout,
      "apply_notification",
      self.payments.apply_notification(&notice, Utc::now()),
    )
    .await;

    match applied {
      Ok(outcome) => {
        if let Reconciliation::Applied {
          order_id,
          payment_status,
          order_status,
          needs_refund,
          ..
        } = &outcome
        {
          if *needs_refund {
            warn!(
              order_id = %order_id,
              payment_status = %payment_status,
              order_status = %order_status,
              "Payment succeeded for a closed order; refund required."
            );
          } else {
            info!(order_id = %order_id, payment_status = %payment_status, order_status = %order_status, "Notification applied.");
          }
        }
        Ok(outcome)
      }
      Err(OrderError::DuplicateNotification { reference, status }) => {
        info!(status = %status, "Duplicate notification ignored.");
        Ok(Reconciliation::Duplicate {
          reference,
          status: notice.status,
        })
      }
      Err(OrderError::InvalidTransition { from, .. }) => {
        info!(current = %from, "Stale notification ignored.");
        Ok(Reconciliation::Stale {
          reference: notice.reference,
          current: from,
          incoming: notice.status,
        })
      }
      Err(e @ OrderError::NotFound { .. }) => {
        warn!(error = %e, "Notification for unknown payment.");
        Err(e)
      }
      Err(e @ OrderError::UnauthenticatedNotification { .. }) => {
        warn!(error = %e, "Notification rejected.");
        Err(e)
      }
      Err(e) => Err(e),
    }
  }
}
