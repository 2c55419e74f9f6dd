// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use orderflow::{
  Actor, CustomerDetails, MemoryStore, MockGateway, NewOrder, Order, OrderLine, OrderService, Product, ServiceConfig,
  ShippingAddress,
};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

pub const SERVER_KEY: &str = "SB-Mid-server-test-key";

// --- Workflow test context ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub steps_executed: Vec<String>,
  pub compensated: Vec<String>,
  pub counter: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum TestError {
  #[error("Workflow error: {0}")]
  Workflow(#[from] orderflow::WorkflowError),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

// --- Service harness ---
pub struct Harness {
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
  pub service: OrderService,
}

impl Harness {
  pub fn new() -> Self {
    Self::with_config(ServiceConfig::default())
  }

  pub fn with_config(config: ServiceConfig) -> Self {
    setup_tracing();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new(SERVER_KEY));
    let service = OrderService::with_store(store.clone(), gateway.clone(), config);
    Self { store, gateway, service }
  }

  pub fn product(&self, stock: i64, price: i64) -> Product {
    let sku = format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..6]);
    self.store.add_product(&sku, "Diecast 1:64 Skyline GT-R", price, stock)
  }

  pub fn stock(&self, product: &Product) -> i64 {
    self.store.stock_of(product.id).unwrap_or(-1)
  }

  /// A pending order for `actor` with one line of `quantity` units.
  pub async fn order(&self, actor: &Actor, product: &Product, quantity: u32) -> Order {
    self
      .service
      .create_order(actor, new_order(&[(product.id, quantity)]))
      .await
      .expect("order creation should succeed")
  }

  /// A pending order that already has a gateway session; returns the order
  /// and the payment reference.
  pub async fn order_with_session(&self, actor: &Actor, product: &Product, quantity: u32) -> (Order, String) {
    let order = self.order(actor, product, quantity).await;
    let session = self
      .service
      .create_payment_session(actor, order.id(), customer())
      .await
      .expect("session creation should succeed");
    (order, session.reference)
  }

  pub async fn deliver(&self, reference: &str, status: &str, amount: i64) -> orderflow::OrderResult<orderflow::Reconciliation> {
    let body = self.gateway.notification(reference, status, amount);
    self.service.handle_notification(&body).await
  }

  pub async fn reload(&self, actor: &Actor, order: &Order) -> Order {
    self.service.order(actor, order.id()).await.expect("order should load")
  }
}

pub fn customer_actor() -> Actor {
  Actor::customer(Uuid::new_v4())
}

pub fn shipping() -> ShippingAddress {
  ShippingAddress {
    full_name: "Budi Santoso".to_string(),
    phone: "+62811000111".to_string(),
    address: "Jl. Merdeka 17".to_string(),
    city: "Bandung".to_string(),
    postal_code: "40111".to_string(),
  }
}

pub fn new_order(lines: &[(Uuid, u32)]) -> NewOrder {
  NewOrder {
    items: lines
      .iter()
      .map(|(product_id, quantity)| OrderLine {
        product_id: *product_id,
        quantity: *quantity,
      })
      .collect(),
    shipping: shipping(),
    notes: None,
  }
}

pub fn customer() -> CustomerDetails {
  CustomerDetails {
    first_name: "Budi".to_string(),
    email: "budi@example.com".to_string(),
    phone: Some("+62811000111".to_string()),
  }
}

// --- Helper for Tracing Setup ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
