// storefront/src/main.rs

use actix_web::{web, App, HttpServer};
use orderflow::{MockGateway, OrderService, PaymentGateway};
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use storefront::config::{AppConfig, GatewayKind, LogFormat};
use storefront::db::{self, PgStore};
use storefront::services::midtrans::MidtransGateway;
use storefront::state::AppState;
use storefront::sweeper::spawn_expiry_sweeper;
use storefront::web::configure_app_routes;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Span close events carry durations
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
  tracing::error!(error = %err, "{}", context);
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      eprintln!("Failed to load application configuration: {}", e);
      return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting storefront server...");

  let pool = db::connect(&app_config)
    .await
    .map_err(|e| startup_error("Failed to connect to the database", e))?;
  db::migrate(&pool)
    .await
    .map_err(|e| startup_error("Failed to apply migrations", e))?;
  let store = Arc::new(PgStore::new(pool));

  if app_config.seed_db {
    db::seed::seed(&store, &app_config)
      .await
      .map_err(|e| startup_error("Failed to seed the database", e))?;
  }

  let gateway: Arc<dyn PaymentGateway> = match app_config.payment_gateway {
    GatewayKind::Midtrans => Arc::new(
      MidtransGateway::new(
        app_config.midtrans_server_key.clone(),
        app_config.midtrans_is_production,
        app_config.gateway_timeout,
      )
      .map_err(|e| startup_error("Failed to build the Midtrans client", e))?,
    ),
    GatewayKind::Mock => {
      tracing::warn!("PAYMENT_GATEWAY=mock: payment sessions are simulated.");
      Arc::new(MockGateway::new(app_config.midtrans_server_key.clone()))
    }
  };
  tracing::info!(gateway = gateway.name(), "Payment gateway configured.");

  let service = OrderService::with_store(store.clone(), gateway, app_config.service_config());
  let app_state = AppState::new(service.clone(), store.clone(), app_config.clone(), Some(store.as_ref().clone()));
  let _sweeper = spawn_expiry_sweeper(service, app_config.expiry_sweep_interval);

  let server_address = app_config.server_address();
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
