// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use orderflow::ServiceConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Midtrans,
  /// In-process gateway; notifications must be signed with `MIDTRANS_SERVER_KEY`.
  Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub db_max_connections: u32,
  pub db_acquire_timeout: Duration,

  pub store_timeout: Duration,
  pub gateway_timeout: Duration,
  pub payment_window: chrono::Duration,
  pub expiry_sweep_interval: Duration,
  /// Derived from the timeouts when unset.
  pub session_claim_ttl: Option<Duration>,

  pub payment_gateway: GatewayKind,
  pub midtrans_server_key: String,
  pub midtrans_is_production: bool,
  pub frontend_url: String,

  pub auth_token_secret: String,
  pub auth_token_ttl: chrono::Duration,

  pub seed_db: bool,
  pub seed_admin_email: String,
  /// No admin account is seeded without one.
  pub seed_admin_password: Option<String>,
  pub log_format: LogFormat,
}

// Secrets stay out of logs.
impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_url", &"[REDACTED]")
      .field("db_max_connections", &self.db_max_connections)
      .field("db_acquire_timeout", &self.db_acquire_timeout)
      .field("store_timeout", &self.store_timeout)
      .field("gateway_timeout", &self.gateway_timeout)
      .field("payment_window", &self.payment_window)
      .field("expiry_sweep_interval", &self.expiry_sweep_interval)
      .field("session_claim_ttl", &self.session_claim_ttl)
      .field("payment_gateway", &self.payment_gateway)
      .field("midtrans_server_key", &"[REDACTED]")
      .field("midtrans_is_production", &self.midtrans_is_production)
      .field("frontend_url", &self.frontend_url)
      .field("auth_token_secret", &"[REDACTED]")
      .field("auth_token_ttl", &self.auth_token_ttl)
      .field("seed_db", &self.seed_db)
      .field("seed_admin_email", &self.seed_admin_email)
      .field("seed_admin_password", &self.seed_admin_password.as_ref().map(|_| "[REDACTED]"))
      .field("log_format", &self.log_format)
      .finish()
  }
}

fn parse<T>(var_name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Builds the config from any variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse::<u16>("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let database_url = get_env("DATABASE_URL")?;
    let db_max_connections = parse::<u32>("DB_MAX_CONNECTIONS", &get_or("DB_MAX_CONNECTIONS", "10"))?;
    let db_acquire_timeout = Duration::from_secs(parse("DB_ACQUIRE_TIMEOUT_SECS", &get_or("DB_ACQUIRE_TIMEOUT_SECS", "5"))?);

    let store_timeout = Duration::from_secs(parse("STORE_TIMEOUT_SECS", &get_or("STORE_TIMEOUT_SECS", "5"))?);
    let gateway_timeout = Duration::from_secs(parse("GATEWAY_TIMEOUT_SECS", &get_or("GATEWAY_TIMEOUT_SECS", "10"))?);
    let payment_window_minutes = parse::<i64>(
      "ORDER_PAYMENT_WINDOW_MINUTES",
      &get_or("ORDER_PAYMENT_WINDOW_MINUTES", "60"),
    )?;
    if payment_window_minutes <= 0 {
      return Err(AppError::Config("ORDER_PAYMENT_WINDOW_MINUTES must be positive".to_string()));
    }
    let sweep_secs = parse::<u64>("EXPIRY_SWEEP_INTERVAL_SECS", &get_or("EXPIRY_SWEEP_INTERVAL_SECS", "60"))?;
    if sweep_secs == 0 {
      return Err(AppError::Config("EXPIRY_SWEEP_INTERVAL_SECS must be positive".to_string()));
    }

    // An unattached payment slot is only reclaimed once the request holding it
    // must have given up: claim write, gateway call and attach write.
    let session_claim_ttl = match get_env("SESSION_CLAIM_TTL_SECS").ok() {
      Some(raw) => {
        let ttl = Duration::from_secs(parse("SESSION_CLAIM_TTL_SECS", &raw)?);
        let busy = gateway_timeout + store_timeout * 2;
        if ttl <= busy {
          return Err(AppError::Config(format!(
            "SESSION_CLAIM_TTL_SECS ({}s) must exceed GATEWAY_TIMEOUT_SECS + 2 x STORE_TIMEOUT_SECS ({}s)",
            ttl.as_secs(),
            busy.as_secs()
          )));
        }
        Some(ttl)
      }
      None => None,
    };

    let payment_gateway = match get_or("PAYMENT_GATEWAY", "midtrans").to_ascii_lowercase().as_str() {
      "midtrans" => GatewayKind::Midtrans,
      "mock" => GatewayKind::Mock,
      other => {
        return Err(AppError::Config(format!(
          "Invalid PAYMENT_GATEWAY '{}': expected 'midtrans' or 'mock'",
          other
        )))
      }
    };
    // Notifications are authenticated with this key, so it is required for the mock too.
    let midtrans_server_key = get_env("MIDTRANS_SERVER_KEY")?;
    let midtrans_is_production = parse::<bool>("MIDTRANS_IS_PRODUCTION", &get_or("MIDTRANS_IS_PRODUCTION", "false"))?;
    let frontend_url = get_or("FRONTEND_URL", "http://localhost:3000")
      .trim_end_matches('/')
      .to_string();

    let auth_token_secret = get_env("AUTH_TOKEN_SECRET")?;
    if auth_token_secret.len() < 32 {
      return Err(AppError::Config("AUTH_TOKEN_SECRET must be at least 32 bytes".to_string()));
    }
    let auth_token_ttl = chrono::Duration::minutes(parse("AUTH_TOKEN_TTL_MINUTES", &get_or("AUTH_TOKEN_TTL_MINUTES", "60"))?);

    let seed_db = parse::<bool>("SEED_DB", &get_or("SEED_DB", "false"))?;
    let seed_admin_email = get_or("SEED_ADMIN_EMAIL", "admin@storefront.local");
    let seed_admin_password = get_env("SEED_ADMIN_PASSWORD").ok();
    let log_format = match get_or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      "pretty" | "text" => LogFormat::Pretty,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      db_max_connections,
      db_acquire_timeout,
      store_timeout,
      gateway_timeout,
      payment_window: chrono::Duration::minutes(payment_window_minutes),
      expiry_sweep_interval: Duration::from_secs(sweep_secs),
      session_claim_ttl,
      payment_gateway,
      midtrans_server_key,
      midtrans_is_production,
      frontend_url,
      auth_token_secret,
      auth_token_ttl,
      seed_db,
      seed_admin_email,
      seed_admin_password,
      log_format,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  /// Order-service settings derived from this config.
  pub fn service_config(&self) -> ServiceConfig {
    let mut config = ServiceConfig {
      payment_window: self.payment_window,
      store_timeout: self.store_timeout,
      gateway_timeout: self.gateway_timeout,
      finish_url: Some(format!("{}/payment/success", self.frontend_url)),
      ..ServiceConfig::default()
    };
    config.session_claim_ttl = self
      .session_claim_ttl
      .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
      .unwrap_or_else(|| config.session_claim_ttl.max(config.min_session_claim_ttl()));
    config
  }
}
