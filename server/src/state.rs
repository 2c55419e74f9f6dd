// storefront/src/state.rs
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::pipelines::AuthPipelines;
use crate::services::tokens::TokenSigner;
use crate::services::users::UserDirectory;
use orderflow::OrderService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub service: OrderService,
  pub users: Arc<dyn UserDirectory>,
  pub auth: Arc<AuthPipelines>,
  pub tokens: Arc<TokenSigner>,
  pub config: Arc<AppConfig>,
  /// `None` when running on in-process stores.
  pub database: Option<PgStore>,
}

impl AppState {
  pub fn new(
    service: OrderService,
    users: Arc<dyn UserDirectory>,
    config: Arc<AppConfig>,
    database: Option<PgStore>,
  ) -> Self {
    let tokens = Arc::new(TokenSigner::new(config.auth_token_secret.as_bytes(), config.auth_token_ttl));
    let auth = Arc::new(AuthPipelines::new(users.clone(), tokens.clone()));
    Self {
      service,
      users,
      auth,
      tokens,
      config,
      database,
    }
  }
}
