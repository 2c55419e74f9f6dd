// tests/expiry_tests.rs
mod common;

use chrono::{Duration, Utc};
use common::*;
use orderflow::{OrderError, OrderStatus, ServiceConfig};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn test_overdue_orders_expire_and_release_stock() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 3).await;
  let window = h.service.config().payment_window;

  let early = h.service.expire_overdue(order.created_at() + window - Duration::seconds(1)).await.unwrap();
  assert!(early.is_empty());
  assert_eq!(h.stock(&x), 7);

  let expired = h.service.expire_overdue(order.created_at() + window).await.unwrap();
  assert_eq!(expired, vec![order.id()]);
  let reloaded = h.reload(&actor, &order).await;
  assert_eq!(reloaded.status(), OrderStatus::Expired);
  assert!(reloaded.stock_released_at().is_some());
  assert_eq!(h.stock(&x), 10);

  // A second sweep finds nothing and releases nothing.
  let again = h.service.expire_overdue(order.created_at() + window * 2).await.unwrap();
  assert!(again.is_empty());
  assert_eq!(h.stock(&x), 10);
}

#[tokio::test]
#[serial]
async fn test_paid_and_canceled_orders_are_not_expired() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let (paid, reference) = h.order_with_session(&actor, &x, 1).await;
  h.deliver(&reference, "settlement", paid.total()).await.unwrap();
  let canceled = h.order(&actor, &x, 1).await;
  h.service.cancel_order(&actor, canceled.id()).await.unwrap();

  let far_future = Utc::now() + Duration::days(2);
  assert!(h.service.expire_overdue(far_future).await.unwrap().is_empty());
  assert_eq!(h.reload(&actor, &paid).await.status(), OrderStatus::Paid);
  assert_eq!(h.stock(&x), 9);
}

#[tokio::test]
#[serial]
async fn test_sweep_is_batched() {
  let h = Harness::with_config(ServiceConfig {
    expiry_batch_size: 2,
    ..ServiceConfig::default()
  });
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  for _ in 0..3 {
    h.order(&actor, &x, 1).await;
  }

  let later = Utc::now() + Duration::days(1);
  assert_eq!(h.service.expire_overdue(later).await.unwrap().len(), 2);
  assert_eq!(h.service.expire_overdue(later).await.unwrap().len(), 1);
  assert_eq!(h.stock(&x), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_cancel_racing_expiry_releases_stock_once() {
  let h = Arc::new(Harness::new());
  let x = h.product(20, 1_000);
  let actor = customer_actor();

  for _ in 0..10 {
    let order = h.order(&actor, &x, 2).await;
    let later = order.created_at() + h.service.config().payment_window;

    let sweeper = {
      let h = h.clone();
      tokio::spawn(async move { h.service.expire_overdue(later).await })
    };
    let canceler = {
      let h = h.clone();
      let order_id = order.id();
      tokio::spawn(async move { h.service.cancel_order(&actor, order_id).await })
    };

    let expired = sweeper.await.unwrap().unwrap();
    let canceled = canceler.await.unwrap();

    let expiry_won = expired.contains(&order.id());
    match (&canceled, expiry_won) {
      (Ok(_), false) => assert_eq!(h.reload(&actor, &order).await.status(), OrderStatus::Canceled),
      (Err(OrderError::InvalidTransition { .. }), true) => {
        assert_eq!(h.reload(&actor, &order).await.status(), OrderStatus::Expired)
      }
      other => panic!("exactly one close must win, got {:?}", other),
    }
    assert_eq!(h.stock(&x), 20, "stock released exactly once");
  }
}
