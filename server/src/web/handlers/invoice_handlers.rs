// server/src/web/handlers/invoice_handlers.rs

use actix_web::{http::header, web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result};
use crate::services::billing;
use crate::state::AppState;

#[instrument(name = "handler::get_invoice", skip(app_state))]
pub async fn get_invoice_handler(app_state: web::Data<AppState>, number: web::Path<String>) -> Result<HttpResponse> {
  let number = number.into_inner();
  let invoice = app_state
    .store
    .find_invoice(&number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  Ok(HttpResponse::Ok().json(json!({ "invoice": invoice })))
}

#[instrument(name = "handler::list_invoice_payments", skip(app_state))]
pub async fn list_invoice_payments_handler(
  app_state: web::Data<AppState>,
  number: web::Path<String>,
) -> Result<HttpResponse> {
  let number = number.into_inner();
  let invoice = app_state
    .store
    .find_invoice(&number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  let payments = app_state.store.list_payments_for_invoice(invoice.id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "invoiceNumber": invoice.number,
    "payments": payments
  })))
}

/// Requests a QR for an invoice that was dispatched while the gateway was down.
#[instrument(name = "handler::request_invoice_qr", skip(app_state))]
pub async fn request_invoice_qr_handler(
  app_state: web::Data<AppState>,
  number: web::Path<String>,
) -> Result<HttpResponse> {
  let invoice = billing::ensure_invoice_qr(app_state.get_ref(), &number.into_inner()).await?;
  info!(has_qr = invoice.qr.is_some(), "QR request handled.");
  Ok(HttpResponse::Ok().json(json!({
    "message": if invoice.qr.is_some() { "Invoice has a payment QR." } else { "Invoice needs no payment QR." },
    "invoice": invoice
  })))
}

/// Re-renders the invoice document, e.g. after a failed render at dispatch time.
#[instrument(name = "handler::render_invoice_document", skip(app_state))]
pub async fn render_invoice_document_handler(
  app_state: web::Data<AppState>,
  number: web::Path<String>,
) -> Result<HttpResponse> {
  let invoice = billing::render_invoice_document(app_state.get_ref(), &number.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Invoice document rendered.",
    "documentUrl": invoice.document_url,
    "invoice": invoice
  })))
}

#[instrument(name = "handler::download_invoice_file", skip(app_state))]
pub async fn download_invoice_file_handler(
  app_state: web::Data<AppState>,
  file_name: web::Path<String>,
) -> Result<HttpResponse> {
  let file_name = file_name.into_inner();
  let bytes = app_state.artifacts.get(&file_name).await?;
  Ok(
    HttpResponse::Ok()
      .content_type(app_state.renderer.content_type())
      .insert_header((header::CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", file_name)))
      .body(bytes),
  )
}
