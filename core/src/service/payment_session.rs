// orderflow/src/service/payment_session.rs

//! Payment-session creation and payment status reads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{bounded, OrderService, ServiceConfig};
use crate::domain::{Actor, Order, OrderStatus, Payment, PaymentSession, PaymentStatus};
use crate::error::{OrderError, OrderResult};
use crate::gateway::{CustomerDetails, GatewaySession, PaymentGateway, SessionRequest};
use crate::ports::{OrderStore, PaymentStore, SlotClaim};
use crate::workflow::{ContextData, Pipeline, StepControl, WorkflowError};

/// Pipeline state for one session request.
#[derive(Debug)]
pub struct PaymentSessionCtx {
  pub actor: Actor,
  pub order_id: Uuid,
  pub customer: CustomerDetails,
  pub order: Option<Order>,
  /// The payment this request inserted; released again if a later step fails.
  pub claimed: Option<Payment>,
  pub gateway_session: Option<GatewaySession>,
  pub session: Option<PaymentSession>,
}

/// Latest payment state of an order, as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentView {
  pub order_id: Uuid,
  pub order_number: String,
  pub order_status: OrderStatus,
  pub reference: String,
  pub payment_status: PaymentStatus,
  pub amount: i64,
  pub payment_type: Option<String>,
  pub redirect_url: Option<String>,
  pub updated_at: DateTime<Utc>,
}

impl PaymentView {
  fn new(order: &Order, payment: &Payment) -> Self {
    Self {
      order_id: order.id(),
      order_number: order.number().to_string(),
      order_status: order.status(),
      reference: payment.reference.clone(),
      payment_status: payment.status,
      amount: payment.amount,
      payment_type: payment.payment_type.clone(),
      redirect_url: payment.redirect_url.clone(),
      updated_at: payment.updated_at,
    }
  }
}

fn missing(step_name: &str, what: &str) -> OrderError {
  WorkflowError::MissingState {
    step_name: step_name.to_string(),
    message: format!("{} not set by an earlier step", what),
  }
  .into()
}

pub(super) fn build_pipeline(
  orders: Arc<dyn OrderStore>,
  payments: Arc<dyn PaymentStore>,
  gateway: Arc<dyn PaymentGateway>,
  config: Arc<ServiceConfig>,
) -> Pipeline<PaymentSessionCtx, OrderError> {
  let mut p = Pipeline::<PaymentSessionCtx, OrderError>::new(
    "payment_session",
    &[
      ("load_order", false),
      ("claim_payment_slot", false),
      ("request_gateway_session", false),
      ("attach_session", false),
    ],
  );

  let load_config = config.clone();
  p.on_step("load_order", move |ctx_data: ContextData<PaymentSessionCtx>| {
    let orders = orders.clone();
    let config = load_config.clone();
    async move {
      let (actor, order_id) = {
        let guard = ctx_data.read();
        (guard.actor, guard.order_id)
      };
      let order = bounded(config.store_timeout, "load_order", orders.order(order_id))
        .await?
        .ok_or_else(|| OrderError::not_found("order", order_id))?;
      actor.ensure_owner(&order)?;
      if order.status() != OrderStatus::Pending {
        return Err(OrderError::invalid_transition(order.status(), "payment session"));
      }
      ctx_data.write().order = Some(order);
      Ok::<_, OrderError>(StepControl::Continue)
    }
  });

  let claim_payments = payments.clone();
  let claim_config = config.clone();
  p.on_step("claim_payment_slot", move |ctx_data: ContextData<PaymentSessionCtx>| {
    let payments = claim_payments.clone();
    let config = claim_config.clone();
    async move {
      let order = ctx_data
        .read()
        .order
        .clone()
        .ok_or_else(|| missing("claim_payment_slot", "order"))?;

      let previous = bounded(config.store_timeout, "payments_for_order", payments.payments_for_order(order.id())).await?;
      let attempt = previous.iter().map(|p| p.attempt).max().unwrap_or(0) + 1;
      let now = Utc::now();
      let candidate = Payment::claim(&order, attempt, now);

      let claim = bounded(
        config.store_timeout,
        "claim_slot",
        payments.claim_slot(candidate, now - config.effective_session_claim_ttl()),
      )
      .await?;

      match claim {
        SlotClaim::Claimed(payment) => {
          ctx_data.write().claimed = Some(payment);
          Ok::<_, OrderError>(StepControl::Continue)
        }
        SlotClaim::Existing(existing) => match PaymentSession::from_payment(&existing, true) {
          Some(session) => {
            info!(reference = %existing.reference, "Returning existing payment session.");
            ctx_data.write().session = Some(session);
            Ok(StepControl::Stop)
          }
          None => Err(OrderError::SessionInFlight { order_id: order.id() }),
        },
      }
    }
  });

  let release_payments = payments.clone();
  p.compensate_step("claim_payment_slot", move |ctx_data: ContextData<PaymentSessionCtx>| {
    let payments = release_payments.clone();
    async move {
      let claimed = ctx_data.read().claimed.as_ref().map(|p| p.id);
      if let Some(payment_id) = claimed {
        if let Err(e) = payments.release_slot(payment_id).await {
          warn!(payment_id = %payment_id, error = %e, "Failed to release payment slot.");
        }
      }
    }
  });

  let gateway_config = config.clone();
  p.on_step("request_gateway_session", move |ctx_data: ContextData<PaymentSessionCtx>| {
    let gateway = gateway.clone();
    let config = gateway_config.clone();
    async move {
      let request = {
        let guard = ctx_data.read();
        let order = guard.order.as_ref().ok_or_else(|| missing("request_gateway_session", "order"))?;
        let payment = guard
          .claimed
          .as_ref()
          .ok_or_else(|| missing("request_gateway_session", "claimed payment"))?;
        SessionRequest {
          reference: payment.reference.clone(),
          gross_amount: payment.amount,
          customer: guard.customer.clone(),
          items: order.items().to_vec(),
          finish_url: config.finish_url.clone(),
        }
      };

      let session = match tokio::time::timeout(config.gateway_timeout, gateway.create_session(&request)).await {
        Ok(Ok(session)) => session,
        Ok(Err(OrderError::GatewayUnavailable { message })) => {
          return Err(OrderError::GatewayUnavailable { message });
        }
        Ok(Err(other)) => {
          return Err(OrderError::GatewayUnavailable {
            message: other.to_string(),
          })
        }
        Err(_) => {
          return Err(OrderError::GatewayUnavailable {
            message: format!("{} gateway timed out after {:?}", gateway.name(), config.gateway_timeout),
          })
        }
      };
      ctx_data.write().gateway_session = Some(session);
      Ok::<_, OrderError>(StepControl::Continue)
    }
  });

  p.on_step("attach_session", move |ctx_data: ContextData<PaymentSessionCtx>| {
    let payments = payments.clone();
    let config = config.clone();
    async move {
      let (payment_id, session) = {
        let guard = ctx_data.read();
        let payment_id = guard
          .claimed
          .as_ref()
          .map(|p| p.id)
          .ok_or_else(|| missing("attach_session", "claimed payment"))?;
        let session = guard
          .gateway_session
          .clone()
          .ok_or_else(|| missing("attach_session", "gateway session"))?;
        (payment_id, session)
      };

      let payment = bounded(
        config.store_timeout,
        "attach_session",
        payments.attach_session(payment_id, &session.token, &session.redirect_url, session.raw.clone()),
      )
      .await?;
      ctx_data.write().session = PaymentSession::from_payment(&payment, false);
      Ok::<_, OrderError>(StepControl::Continue)
    }
  });

  p
}

impl OrderService {
  /// Opens (or returns the already open) gateway session for a `PENDING`
  /// order.
  ///
  /// At most one active payment exists per order. A concurrent request that
  /// finds the slot taken but the session not yet attached gets
  /// `SessionInFlight`. When the gateway fails the claimed slot is released
  /// and the order stays `PENDING`.
  #[instrument(name = "OrderService::create_payment_session", skip(self, actor, customer), fields(user_id = %actor.user_id))]
  pub async fn create_payment_session(
    &self,
    actor: &Actor,
    order_id: Uuid,
    customer: CustomerDetails,
  ) -> OrderResult<PaymentSession> {
    let ctx_data = ContextData::new(PaymentSessionCtx {
      actor: *actor,
      order_id,
      customer,
      order: None,
      claimed: None,
      gateway_session: None,
      session: None,
    });

    self.payment_session.run(ctx_data.clone()).await?;

    let session = ctx_data
      .write()
      .session
      .take()
      .ok_or_else(|| missing("attach_session", "payment session"))?;
    if !session.reused {
      info!(reference = %session.reference, "Payment session created.");
    }
    Ok(session)
  }

  async fn latest_payment(&self, order: &Order) -> OrderResult<Payment> {
    bounded(
      self.config.store_timeout,
      "payments_for_order",
      self.payments.payments_for_order(order.id()),
    )
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| OrderError::not_found("payment", order.id()))
  }

  /// Latest payment of an order from local state.
  pub async fn payment_status(&self, actor: &Actor, order_id: Uuid) -> OrderResult<PaymentView> {
    let order = self.order(actor, order_id).await?;
    let payment = self.latest_payment(&order).await?;
    Ok(PaymentView::new(&order, &payment))
  }

  /// Pulls the gateway's view of the active payment and reconciles it before
  /// answering. When the gateway cannot be reached the local state is
  /// returned as is.
  #[instrument(name = "OrderService::refresh_payment_status", skip(self, actor), fields(user_id = %actor.user_id))]
  pub async fn refresh_payment_status(&self, actor: &Actor, order_id: Uuid) -> OrderResult<PaymentView> {
    let order = self.order(actor, order_id).await?;
    let payment = self.latest_payment(&order).await?;
    if !payment.is_active() || !payment.has_session() {
      return Ok(PaymentView::new(&order, &payment));
    }

    let pulled = tokio::time::timeout(self.config.gateway_timeout, self.gateway.transaction_status(&payment.reference)).await;
    match pulled {
      Ok(Ok(Some(status))) => {
        if let Err(e) = self.reconcile(status.into_notification()).await {
          warn!(reference = %payment.reference, error = %e, "Pulled status could not be applied.");
        }
      }
      Ok(Ok(None)) => {}
      Ok(Err(e)) => warn!(reference = %payment.reference, error = %e, "Status pull failed; serving cached status."),
      Err(_) => warn!(reference = %payment.reference, "Status pull timed out; serving cached status."),
    }

    let order = self.load_order(order_id).await?;
    let payment = self.latest_payment(&order).await?;
    Ok(PaymentView::new(&order, &payment))
  }
}
