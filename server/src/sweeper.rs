// storefront/src/sweeper.rs

//! Background task that expires unpaid orders once their payment window
//! has passed.

use chrono::Utc;
use orderflow::OrderService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

/// Runs one expiry pass. Returns how many orders were expired.
#[instrument(name = "sweeper::sweep_once", skip_all)]
pub async fn sweep_once(service: &OrderService) -> usize {
  match service.expire_overdue(Utc::now()).await {
    Ok(expired) => {
      if !expired.is_empty() {
        info!(count = expired.len(), order_ids = ?expired, "Expired overdue orders.");
      }
      expired.len()
    }
    Err(e) => {
      error!(error = %e, "Expiry sweep failed; retrying on the next tick.");
      0
    }
  }
}

pub fn spawn_expiry_sweeper(service: OrderService, every: Duration) -> JoinHandle<()> {
  info!(interval_secs = every.as_secs(), "Starting order expiry sweeper.");
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      sweep_once(&service).await;
    }
  })
}
