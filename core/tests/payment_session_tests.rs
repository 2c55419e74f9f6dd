// tests/payment_session_tests.rs
mod common;

use chrono::Utc;
use common::*;
use futures_util::future::join_all;
use orderflow::{OrderError, OrderStatus, Payment, PaymentStatus, PaymentStore, ServiceConfig, SlotClaim};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn test_session_is_created_for_pending_order() {
  let h = Harness::new();
  let x = h.product(10, 120_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 2).await;

  let session = h
    .service
    .create_payment_session(&actor, order.id(), customer())
    .await
    .unwrap();

  assert!(!session.reused);
  assert_eq!(session.order_id, order.id());
  assert_eq!(session.reference, format!("{}-P1", order.number()));
  assert!(session.redirect_url.contains(&session.token));

  let sent = h.gateway.sessions();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].gross_amount, 240_000);
  assert_eq!(sent[0].customer.email, "budi@example.com");

  let view = h.service.payment_status(&actor, order.id()).await.unwrap();
  assert_eq!(view.payment_status, PaymentStatus::Pending);
  assert_eq!(view.amount, 240_000);
}

#[tokio::test]
#[serial]
async fn test_second_request_returns_the_same_session() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  let first = h.service.create_payment_session(&actor, order.id(), customer()).await.unwrap();
  let second = h.service.create_payment_session(&actor, order.id(), customer()).await.unwrap();

  assert!(second.reused);
  assert_eq!(first.token, second.token);
  assert_eq!(first.payment_id, second.payment_id);
  assert_eq!(h.gateway.session_count(), 1, "no second gateway transaction");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_requests_open_one_gateway_transaction() {
  let h = Arc::new(Harness::new());
  h.gateway.set_latency(Duration::from_millis(50));
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  let attempts = (0..5).map(|_| {
    let h = h.clone();
    let order_id = order.id();
    tokio::spawn(async move { h.service.create_payment_session(&actor, order_id, customer()).await })
  });
  let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

  let created = results.iter().filter(|r| matches!(r, Ok(s) if !s.reused)).count();
  for result in &results {
    assert!(
      matches!(result, Ok(_) | Err(OrderError::SessionInFlight { .. })),
      "unexpected result {:?}",
      result
    );
  }
  assert_eq!(created, 1);
  assert_eq!(h.gateway.session_count(), 1);

  // Once the first request finishes, everyone gets the same session.
  let again = h.service.create_payment_session(&actor, order.id(), customer()).await.unwrap();
  assert!(again.reused);
}

#[tokio::test]
#[serial]
async fn test_gateway_failure_leaves_order_pending_without_active_payment() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  h.gateway.set_failing(true);
  let err = h
    .service
    .create_payment_session(&actor, order.id(), customer())
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::GatewayUnavailable { .. }));
  assert!(err.is_retryable());

  assert_eq!(h.reload(&actor, &order).await.status(), OrderStatus::Pending);
  let payments = h.store.payments_for_order(order.id()).await.unwrap();
  assert!(payments.iter().all(|p| !p.is_active()), "claimed slot must be released");

  // The caller can retry; the new attempt gets a fresh reference.
  h.gateway.set_failing(false);
  let session = h.service.create_payment_session(&actor, order.id(), customer()).await.unwrap();
  assert_eq!(session.reference, format!("{}-P2", order.number()));
  assert_eq!(h.stock(&x), 9, "reservation untouched by gateway trouble");
}

#[tokio::test]
#[serial]
async fn test_gateway_timeout_is_unavailable() {
  let h = Harness::with_config(ServiceConfig {
    gateway_timeout: Duration::from_millis(20),
    ..ServiceConfig::default()
  });
  h.gateway.set_latency(Duration::from_millis(200));
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  let err = h
    .service
    .create_payment_session(&actor, order.id(), customer())
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::GatewayUnavailable { .. }));
  let payments = h.store.payments_for_order(order.id()).await.unwrap();
  assert!(payments.iter().all(|p| !p.is_active()));
}

#[tokio::test]
#[serial]
async fn test_only_pending_orders_owned_by_caller_can_be_paid() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let owner = customer_actor();
  let order = h.order(&owner, &x, 1).await;

  let err = h
    .service
    .create_payment_session(&customer_actor(), order.id(), customer())
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::Forbidden(_)));

  h.service.cancel_order(&owner, order.id()).await.unwrap();
  let err = h
    .service
    .create_payment_session(&owner, order.id(), customer())
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::InvalidTransition { .. }));
  assert_eq!(h.gateway.session_count(), 0);
}

#[tokio::test]
#[serial]
async fn test_unfinished_claim_is_in_flight() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  // A claim whose request has not heard back from the gateway yet.
  let pending = Payment::claim(&order, 1, Utc::now());
  let claim = h.store.claim_slot(pending, Utc::now()).await.unwrap();
  assert!(matches!(claim, SlotClaim::Claimed(_)));

  let err = h
    .service
    .create_payment_session(&actor, order.id(), customer())
    .await
    .unwrap_err();
  assert!(matches!(err, OrderError::SessionInFlight { .. }));
  assert_eq!(h.gateway.session_count(), 0);
}

#[tokio::test]
#[serial]
async fn test_abandoned_claim_is_reclaimed() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  // Older than any request could still be running.
  let claimed_at = Utc::now() - h.service.config().effective_session_claim_ttl() - chrono::Duration::seconds(1);
  let abandoned = Payment::claim(&order, 1, claimed_at);
  h.store.claim_slot(abandoned.clone(), claimed_at).await.unwrap();

  let session = h
    .service
    .create_payment_session(&actor, order.id(), customer())
    .await
    .unwrap();
  assert_eq!(session.reference, format!("{}-P2", order.number()));

  let old = h.store.payment_by_reference(&abandoned.reference).await.unwrap().unwrap();
  assert_eq!(old.status, PaymentStatus::Failure);
}

#[test]
fn test_claim_ttl_never_undercuts_a_running_request() {
  let config = ServiceConfig {
    session_claim_ttl: chrono::Duration::milliseconds(50),
    gateway_timeout: Duration::from_secs(60),
    store_timeout: Duration::from_secs(5),
    ..ServiceConfig::default()
  };
  assert_eq!(config.min_session_claim_ttl(), chrono::Duration::seconds(71));
  assert_eq!(config.effective_session_claim_ttl(), chrono::Duration::seconds(71));

  let generous = ServiceConfig {
    session_claim_ttl: chrono::Duration::minutes(5),
    ..ServiceConfig::default()
  };
  assert_eq!(generous.effective_session_claim_ttl(), chrono::Duration::minutes(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_slow_gateway_is_not_raced_by_a_short_claim_ttl() {
  let h = Arc::new(Harness::with_config(ServiceConfig {
    session_claim_ttl: chrono::Duration::milliseconds(50),
    gateway_timeout: Duration::from_secs(2),
    ..ServiceConfig::default()
  }));
  h.gateway.set_latency(Duration::from_millis(300));
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  let first = {
    let h = h.clone();
    let order_id = order.id();
    tokio::spawn(async move { h.service.create_payment_session(&actor, order_id, customer()).await })
  };
  // Past the configured TTL, while the first call is still at the gateway.
  tokio::time::sleep(Duration::from_millis(100)).await;
  let second = h.service.create_payment_session(&actor, order.id(), customer()).await;
  assert!(matches!(second, Err(OrderError::SessionInFlight { .. })), "got {:?}", second);

  let first = first.await.unwrap().unwrap();
  assert_eq!(first.reference, format!("{}-P1", order.number()));
  assert_eq!(h.gateway.session_count(), 1);

  let again = h.service.create_payment_session(&actor, order.id(), customer()).await.unwrap();
  assert!(again.reused);
  assert_eq!(again.payment_id, first.payment_id);
}

#[tokio::test]
#[serial]
async fn test_refresh_pulls_gateway_status() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let (order, reference) = h.order_with_session(&actor, &x, 3).await;

  // Gateway has nothing yet: local state is served.
  let view = h.service.refresh_payment_status(&actor, order.id()).await.unwrap();
  assert_eq!(view.payment_status, PaymentStatus::Pending);

  h.gateway.set_transaction_status(&reference, PaymentStatus::Settlement, order.total());
  let view = h.service.refresh_payment_status(&actor, order.id()).await.unwrap();
  assert_eq!(view.payment_status, PaymentStatus::Settlement);
  assert_eq!(view.order_status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_refresh_serves_cached_status_when_gateway_is_down() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let (order, _reference) = h.order_with_session(&actor, &x, 1).await;

  h.gateway.set_failing(true);
  let view = h.service.refresh_payment_status(&actor, order.id()).await.unwrap();
  assert_eq!(view.payment_status, PaymentStatus::Pending);
  assert_eq!(view.order_status, OrderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_payment_status_without_payment_is_not_found() {
  let h = Harness::new();
  let x = h.product(10, 1_000);
  let actor = customer_actor();
  let order = h.order(&actor, &x, 1).await;

  let err = h.service.payment_status(&actor, order.id()).await.unwrap_err();
  assert!(matches!(err, OrderError::NotFound { entity: "payment", .. }));
}
