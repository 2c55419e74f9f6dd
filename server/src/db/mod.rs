// storefront/src/db/mod.rs

//! PostgreSQL pool setup, migrations, the `PgStore` adapter and demo seed data.

pub mod pg_store;
pub mod seed;

pub use pg_store::PgStore;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub async fn connect(config: &AppConfig) -> Result<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(config.db_max_connections)
    .acquire_timeout(config.db_acquire_timeout)
    .connect(&config.database_url)
    .await?;
  info!(max_connections = config.db_max_connections, "Connected to the database.");
  Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations")
    .run(pool)
    .await
    .map_err(|e| AppError::Internal(format!("Database migration failed: {}", e)))?;
  info!("Database migrations applied.");
  Ok(())
}
