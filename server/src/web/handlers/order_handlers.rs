// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::{NewOrder, Page};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
  pub limit: Option<u32>,
  pub offset: Option<u32>,
}

impl PageQuery {
  fn page(&self) -> Page {
    let default = Page::default();
    Page::new(self.limit.unwrap_or(default.limit), self.offset.unwrap_or(default.offset))
  }
}

#[instrument(name = "handler::create_order", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.service.create_order(&auth_user.actor(), payload.into_inner()).await?;
  info!(order_id = %order.id(), total = order.total(), "Order placed.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.service.orders_for_user(&auth_user.actor(), query.page()).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.service.order(&auth_user.actor(), order_id.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::get_order_status", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let status = app_state
    .service
    .order_status(&auth_user.actor(), order_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(status))
}

#[instrument(name = "handler::get_order_by_number", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_by_number_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  number: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.service.order_by_number(&auth_user.actor(), &number).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .service
    .cancel_order(&auth_user.actor(), order_id.into_inner())
    .await?;
  info!(order_id = %order.id(), "Order canceled.");
  Ok(HttpResponse::Ok().json(order))
}
