// storefront/tests/common/mod.rs
#![allow(dead_code)]

use actix_web::http::header;
use actix_web::test::TestRequest;
use once_cell::sync::Lazy;
use orderflow::{MemoryStore, MockGateway, OrderService, Product};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use storefront::config::AppConfig;
use storefront::db::{self, PgStore};
use storefront::services::users::MemoryUsers;
use storefront::state::AppState;
use uuid::Uuid;

pub const SERVER_KEY: &str = "SB-Mid-server-api-test";
pub const PASSWORD: &str = "diecast-collector";

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
});

pub fn config() -> AppConfig {
  let vars: HashMap<&str, &str> = HashMap::from([
    ("DATABASE_URL", "postgres://unused/storefront"),
    ("MIDTRANS_SERVER_KEY", SERVER_KEY),
    ("AUTH_TOKEN_SECRET", "api-test-secret-api-test-secret-0123"),
    ("PAYMENT_GATEWAY", "mock"),
  ]);
  AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).expect("test config should load")
}

/// Application state over in-process stores, with handles kept for assertions.
pub struct TestWorld {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
}

impl TestWorld {
  pub fn new() -> Self {
    Lazy::force(&TRACING);
    let config = Arc::new(config());
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new(SERVER_KEY));
    let service = OrderService::with_store(store.clone(), gateway.clone(), config.service_config());
    let state = AppState::new(service, Arc::new(MemoryUsers::new()), config, None);
    Self { state, store, gateway }
  }

  pub fn product(&self, stock: i64, price: i64) -> Product {
    let sku = format!("TOM-{}", &Uuid::new_v4().simple().to_string()[..6]);
    self.store.add_product(&sku, "Tomica Nissan Skyline GT-R R34", price, stock)
  }
}

/// A migrated store on `DATABASE_URL`. Only the ignored database tests call
/// this; run them with `cargo test -- --ignored` against a scratch database.
pub async fn pg_store() -> PgStore {
  Lazy::force(&TRACING);
  dotenvy::dotenv().ok();
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
  let pool = sqlx::postgres::PgPoolOptions::new()
    .max_connections(10)
    .connect(&url)
    .await
    .expect("database should be reachable");
  db::migrate(&pool).await.expect("migrations should apply");
  PgStore::new(pool)
}

pub fn register(email: &str) -> TestRequest {
  TestRequest::post().uri("/api/v1/auth/register").set_json(json!({
    "email": email,
    "password": PASSWORD,
    "full_name": "Siti Rahma",
  }))
}

pub fn authed(request: TestRequest, token: &str) -> TestRequest {
  request.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
}

pub fn order_body(lines: &[(Uuid, u32)]) -> Value {
  let items: Vec<Value> = lines
    .iter()
    .map(|(product_id, quantity)| json!({"product_id": product_id, "quantity": quantity}))
    .collect();
  json!({
    "items": items,
    "shipping": {
      "full_name": "Siti Rahma",
      "phone": "+62812000222",
      "address": "Jl. Asia Afrika 8",
      "city": "Bandung",
      "postal_code": "40111",
    },
  })
}
