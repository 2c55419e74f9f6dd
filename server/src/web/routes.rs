// storefront/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;
use crate::web::handlers::{auth_handlers, order_handlers, payment_handlers, webhook_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  let database = match &app_state.database {
    Some(store) => match store.ping().await {
      Ok(()) => "ok",
      Err(e) => {
        warn!(error = %e, "Health check could not reach the database.");
        return HttpResponse::ServiceUnavailable().json(json!({"status": "degraded", "database": "unreachable"}));
      }
    },
    None => "in-memory",
  };
  HttpResponse::Ok().json(json!({"status": "ok", "database": database}))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .route("/register", web::post().to(auth_handlers::register_handler))
          .route("/login", web::post().to(auth_handlers::login_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/number/{number}", web::get().to(order_handlers::get_order_by_number_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/status", web::get().to(order_handlers::get_order_status_handler))
          .route("/{order_id}/cancel", web::put().to(order_handlers::cancel_order_handler)),
      )
      .service(
        web::scope("/payments")
          .route("/create", web::post().to(payment_handlers::create_payment_handler))
          .route("/status/{order_id}", web::get().to(payment_handlers::payment_status_handler)),
      )
      // Called by the gateway, so no bearer authentication.
      .service(
        web::scope("/webhooks").route(
          "/midtrans",
          web::post().to(webhook_handlers::midtrans_notification_handler),
        ),
      ),
  );
}
