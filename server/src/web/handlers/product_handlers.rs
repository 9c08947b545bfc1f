// server/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::NewProduct;
use crate::state::AppState;

#[instrument(name = "handler::create_product", skip(app_state, req_payload), fields(name = %req_payload.name))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewProduct>,
) -> Result<HttpResponse> {
  let new_product = req_payload.into_inner();
  if new_product.name.trim().is_empty() {
    return Err(AppError::InvalidInput("Product name is required".to_string()));
  }
  let product = new_product.into_product();
  app_state.store.insert_product(&product).await?;
  info!(product_id = %product.id, "Product created.");

  Ok(HttpResponse::Created().json(json!({
    "message": "Product created.",
    "product": product
  })))
}

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  let products = app_state.store.list_products().await?;
  info!("Fetched {} products.", products.len());
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let product_id = path.into_inner();
  let product = app_state
    .store
    .find_product(product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;
  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}
