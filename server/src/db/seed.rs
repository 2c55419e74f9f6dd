// storefront/src/db/seed.rs

//! Demo catalog and admin account, inserted only when `SEED_DB=true`.
//! Existing rows are left alone, so seeding is safe to repeat.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::PgStore;
use crate::errors::Result;
use crate::models::User;
use crate::services::auth_service;
use crate::services::users::{normalize_email, UserDirectory};

/// `(sku, name, price, stock)`
const DEMO_PRODUCTS: &[(&str, &str, i64, i64)] = &[
  ("HW-LAMBO-001", "Hot Wheels Lamborghini Huracan", 25_000, 50),
  ("TOM-SUPRA-001", "Tomica Toyota Supra GR", 65_000, 30),
  ("MJR-PORSCHE-001", "Majorette Porsche 911 GT3 RS", 45_000, 25),
  ("MB-DEFENDER-001", "Matchbox Land Rover Defender 110", 30_000, 40),
  ("GL-BRONCO-001", "Greenlight Ford Bronco 1:64", 120_000, 10),
];

#[instrument(name = "db::seed", skip_all)]
pub async fn seed(store: &PgStore, config: &AppConfig) -> Result<()> {
  let mut inserted = 0u64;
  for (sku, name, price, stock) in DEMO_PRODUCTS {
    let result = sqlx::query(
      "INSERT INTO products (id, sku, name, price, stock, is_published) VALUES ($1, $2, $3, $4, $5, TRUE) \
       ON CONFLICT (sku) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(*sku)
    .bind(*name)
    .bind(*price)
    .bind(*stock)
    .execute(store.pool())
    .await?;
    inserted += result.rows_affected();
  }
  info!(inserted, total = DEMO_PRODUCTS.len(), "Demo products seeded.");

  let Some(password) = config.seed_admin_password.as_deref() else {
    info!("SEED_ADMIN_PASSWORD not set; skipping admin account.");
    return Ok(());
  };
  let email = normalize_email(&config.seed_admin_email);
  if store.by_email(&email).await?.is_some() {
    info!(%email, "Admin account already exists.");
    return Ok(());
  }
  let now = Utc::now();
  store
    .insert(&User {
      id: Uuid::new_v4(),
      email: email.clone(),
      full_name: "Store Admin".to_string(),
      password_hash: auth_service::hash_password(password)?,
      is_admin: true,
      created_at: now,
      updated_at: now,
    })
    .await?;
  info!(%email, "Admin account seeded.");
  Ok(())
}
