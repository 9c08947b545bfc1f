// server/src/web/handlers/party_handlers.rs

//! Buyers and sellers: registration, lookup and the buyer's order and notification feeds.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{NewBuyer, NewSeller};
use crate::state::AppState;

#[instrument(name = "handler::create_buyer", skip(app_state, req_payload))]
pub async fn create_buyer_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewBuyer>,
) -> Result<HttpResponse> {
  let new_buyer = req_payload.into_inner();
  if new_buyer.name.trim().is_empty() {
    return Err(AppError::InvalidInput("Buyer name is required".to_string()));
  }
  let buyer = new_buyer.into_buyer();
  app_state.store.insert_buyer(&buyer).await?;
  info!(buyer_id = %buyer.id, "Buyer registered.");

  Ok(HttpResponse::Created().json(json!({
    "message": "Buyer registered.",
    "buyer": buyer
  })))
}

#[instrument(name = "handler::get_buyer", skip(app_state, path), fields(buyer_id = %path.as_ref()))]
pub async fn get_buyer_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let buyer_id = path.into_inner();
  let buyer = app_state
    .store
    .find_buyer(buyer_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Buyer {} not found", buyer_id)))?;
  Ok(HttpResponse::Ok().json(json!({ "buyer": buyer })))
}

#[instrument(name = "handler::list_buyer_orders", skip(app_state, path), fields(buyer_id = %path.as_ref()))]
pub async fn list_buyer_orders_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse> {
  let orders = app_state.store.list_orders_for_buyer(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::list_buyer_notifications", skip(app_state, path), fields(buyer_id = %path.as_ref()))]
pub async fn list_buyer_notifications_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse> {
  let notifications = app_state.store.list_notifications(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "notifications": notifications })))
}

#[instrument(name = "handler::create_seller", skip(app_state, req_payload))]
pub async fn create_seller_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewSeller>,
) -> Result<HttpResponse> {
  let new_seller = req_payload.into_inner();
  if new_seller.name.trim().is_empty() {
    return Err(AppError::InvalidInput("Seller name is required".to_string()));
  }
  let seller = new_seller.into_seller();
  app_state.store.insert_seller(&seller).await?;
  info!(seller_id = %seller.id, "Seller registered.");

  Ok(HttpResponse::Created().json(json!({
    "message": "Seller registered.",
    "seller": seller
  })))
}

#[instrument(name = "handler::get_seller", skip(app_state, path), fields(seller_id = %path.as_ref()))]
pub async fn get_seller_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let seller_id = path.into_inner();
  let seller = app_state
    .store
    .find_seller(seller_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Seller {} not found", seller_id)))?;
  Ok(HttpResponse::Ok().json(json!({ "seller": seller })))
}
