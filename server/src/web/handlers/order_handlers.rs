// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{Actor, OrderStatus};
use crate::pipelines::contexts::{DispatchRequest, PlaceOrderRequest};
use crate::pipelines::{dispatch_order, place_order};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
  pub status: OrderStatus,
  pub note: Option<String>,
}

#[instrument(name = "handler::place_order", skip(app_state, req_payload))]
pub async fn place_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<PlaceOrderRequest>,
) -> Result<HttpResponse> {
  let order = place_order(app_state.get_ref(), req_payload.into_inner()).await?;
  info!(order_id = %order.id, final_amount = %order.final_amount, "Order created.");

  Ok(HttpResponse::Created().json(json!({
    "message": "Order placed.",
    "order": order
  })))
}

#[instrument(name = "handler::get_order", skip(app_state, path), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let order_id = path.into_inner();
  let order = app_state
    .store
    .find_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(
  name = "handler::dispatch_order",
  skip(app_state, path, actor, req_payload),
  fields(order_id = %path.as_ref(), actor = %actor.id)
)]
pub async fn dispatch_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
  req_payload: Option<web::Json<DispatchRequest>>,
) -> Result<HttpResponse> {
  let request = req_payload.map(web::Json::into_inner).unwrap_or_default();
  let (order, invoice) = dispatch_order(app_state.get_ref(), path.into_inner(), actor, request).await?;

  Ok(HttpResponse::Ok().json(json!({
    "message": "Order dispatched.",
    "order": order,
    "invoice": invoice
  })))
}

/// Status changes other than dispatch: delivered, returned, cancelled.
#[instrument(
  name = "handler::update_order_status",
  skip(app_state, path, actor, req_payload),
  fields(order_id = %path.as_ref(), actor = %actor.id, status = ?req_payload.status)
)]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
  req_payload: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse> {
  if !actor.role.handles_fulfilment() {
    return Err(AppError::Forbidden(format!("Role {:?} cannot change order status", actor.role)));
  }
  let order_id = path.into_inner();
  let StatusUpdateRequest { status, note } = req_payload.into_inner();

  let mut tx = app_state.store.begin().await?;
  let mut order = tx
    .lock_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  let now = Utc::now();
  order.transition(status, &actor.id, note, now)?;
  order.updated_at = now;
  tx.update_order(&order).await?;
  tx.commit().await?;

  info!(status = ?order.status, "Order status updated.");
  Ok(HttpResponse::Ok().json(json!({
    "message": "Order status updated.",
    "order": order
  })))
}
