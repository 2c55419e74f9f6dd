// orderflow/src/service/checkout.rs

//! Order creation: validate, capture catalog prices, reserve and record.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{bounded, OrderService, ServiceConfig};
use crate::domain::{Actor, LineItem, Order, ShippingAddress};
use crate::error::{OrderError, OrderResult};
use crate::ports::{Catalog, OrderStore};
use crate::workflow::{ContextData, Pipeline, StepControl, WorkflowError};

/// Largest quantity accepted on a single line.
const MAX_LINE_QUANTITY: u32 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
  pub product_id: Uuid,
  pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
  pub items: Vec<OrderLine>,
  pub shipping: ShippingAddress,
  #[serde(default)]
  pub notes: Option<String>,
}

/// Pipeline state for one checkout.
#[derive(Debug)]
pub struct CheckoutCtx {
  pub actor: Actor,
  pub request: NewOrder,
  pub items: Vec<LineItem>,
  pub order: Option<Order>,
}

fn validate(request: &NewOrder) -> OrderResult<()> {
  if request.items.is_empty() {
    return Err(OrderError::Validation("order must have at least one item".to_string()));
  }
  if let Some(line) = request.items.iter().find(|l| l.quantity == 0 || l.quantity > MAX_LINE_QUANTITY) {
    return Err(OrderError::Validation(format!(
      "quantity for product {} must be between 1 and {}",
      line.product_id, MAX_LINE_QUANTITY
    )));
  }
  request.shipping.validate()
}

pub(super) fn build_pipeline(
  catalog: Arc<dyn Catalog>,
  orders: Arc<dyn OrderStore>,
  config: Arc<ServiceConfig>,
) -> Pipeline<CheckoutCtx, OrderError> {
  let mut p = Pipeline::<CheckoutCtx, OrderError>::new(
    "checkout",
    &[
      ("validate_request", false),
      ("snapshot_line_items", false),
      ("reserve_and_record", false),
    ],
  );

  p.on_step("validate_request", |ctx_data: ContextData<CheckoutCtx>| async move {
    validate(&ctx_data.read().request)?;
    Ok::<_, OrderError>(StepControl::Continue)
  });

  let snapshot_config = config.clone();
  p.on_step("snapshot_line_items", move |ctx_data: ContextData<CheckoutCtx>| {
    let catalog = catalog.clone();
    let config = snapshot_config.clone();
    async move {
      let lines = ctx_data.read().request.items.clone();
      let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
      ids.sort();
      ids.dedup();

      let products: HashMap<Uuid, _> = bounded(config.store_timeout, "catalog_products", catalog.products(&ids))
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

      let mut items = Vec::with_capacity(lines.len());
      for line in &lines {
        let product = products
          .get(&line.product_id)
          .ok_or_else(|| OrderError::not_found("product", line.product_id))?;
        if !product.is_published {
          return Err(OrderError::Validation(format!("Product {} is not available", product.name)));
        }
        items.push(LineItem {
          product_id: product.id,
          sku: product.sku.clone(),
          name: product.name.clone(),
          quantity: line.quantity,
          unit_price: product.price,
        });
      }
      debug!(lines = items.len(), "Captured catalog prices.");
      ctx_data.write().items = items;
      Ok::<_, OrderError>(StepControl::Continue)
    }
  });

  p.on_step("reserve_and_record", move |ctx_data: ContextData<CheckoutCtx>| {
    let orders = orders.clone();
    let config = config.clone();
    async move {
      let order = {
        let mut guard = ctx_data.write();
        let items = std::mem::take(&mut guard.items);
        let shipping = guard.request.shipping.clone();
        let notes = guard.request.notes.clone();
        Order::new(guard.actor.user_id, items, shipping, notes, Utc::now())?
      };
      let recorded = bounded(config.store_timeout, "create_reserved", orders.create_reserved(order)).await?;
      ctx_data.write().order = Some(recorded);
      Ok::<_, OrderError>(StepControl::Continue)
    }
  });

  p
}

impl OrderService {
  /// Creates a `PENDING` order and reserves its stock in one step.
  ///
  /// A single short line fails the whole order with `InsufficientStock`
  /// listing every short product; nothing is persisted then.
  #[instrument(name = "OrderService::create_order", skip_all, fields(user_id = %actor.user_id, lines = request.items.len()))]
  pub async fn create_order(&self, actor: &Actor, request: NewOrder) -> OrderResult<Order> {
    let ctx_data = ContextData::new(CheckoutCtx {
      actor: *actor,
      request,
      items: Vec::new(),
      order: None,
    });

    self.checkout.run(ctx_data.clone()).await?;

    let order = ctx_data.write().order.take().ok_or_else(|| WorkflowError::MissingState {
      step_name: "reserve_and_record".to_string(),
      message: "no order recorded".to_string(),
    })?;
    info!(order_number = %order.number(), total = order.total(), "Order created.");
    Ok(order)
  }
}
