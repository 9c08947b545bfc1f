// server/src/services/billing.rs

//! Invoice follow-ups that run outside the dispatch transaction: gateway QR requests and
//! document rendering. Both are safe to repeat.

use crate::errors::{AppError, Result};
use crate::models::{Invoice, Payment, PaymentStatus};
use crate::models::payment::idempotency_key;
use crate::services::renderer::InvoiceDocument;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// The `created` payment written when a QR is first issued for an invoice.
pub fn qr_payment(invoice: &Invoice, gateway: &str, at: DateTime<Utc>) -> Payment {
  Payment {
    id: Uuid::new_v4(),
    idempotency_key: idempotency_key(gateway, &invoice.number, None),
    invoice_id: invoice.id,
    order_id: invoice.order_id,
    buyer_id: invoice.buyer_id,
    gateway: gateway.to_string(),
    amount: invoice.balance_due,
    status: PaymentStatus::Created,
    gateway_order_id: Some(invoice.number.clone()),
    gateway_txn_id: None,
    signature_verified: false,
    raw_payload: None,
    created_at: at,
    updated_at: at,
  }
}

/// Makes sure an open invoice carries a gateway QR. Paid invoices and invoices that
/// already have one come back unchanged without calling the gateway.
#[instrument(name = "billing::ensure_invoice_qr", skip(state), err(Display))]
pub async fn ensure_invoice_qr(state: &AppState, number: &str) -> Result<Invoice> {
  let invoice = state
    .store
    .find_invoice(number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  if !invoice.wants_qr() {
    event!(Level::DEBUG, "Invoice needs no QR.");
    return Ok(invoice);
  }

  let qr = state.gateway.create_qr(&invoice.number, invoice.balance_due).await?;

  let mut tx = state.store.begin().await?;
  let mut locked = tx
    .lock_invoice(number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  let now = Utc::now();
  if locked.attach_qr(qr, now) {
    tx.update_invoice(&locked).await?;
    tx.claim_payment(&qr_payment(&locked, state.gateway.name(), now)).await?;
    tx.commit().await?;
    event!(Level::INFO, "QR attached to invoice.");
  } else {
    // Someone else attached a QR (or settled the invoice) while the gateway call was in flight.
    event!(Level::INFO, "QR no longer wanted; discarding the new one.");
  }
  Ok(locked)
}

/// Renders the invoice document, stores it, and links its URL from the invoice and order.
#[instrument(name = "billing::render_invoice_document", skip(state), err(Display))]
pub async fn render_invoice_document(state: &AppState, number: &str) -> Result<Invoice> {
  let invoice = state
    .store
    .find_invoice(number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  let order_number = state
    .store
    .find_order(invoice.order_id)
    .await?
    .and_then(|o| o.order_number);

  let document = InvoiceDocument {
    company: state.config.company.clone(),
    order_number,
    invoice,
  };
  let bytes = state.renderer.render(&document)?;
  let url = state.artifacts.put(&document.file_name(), bytes).await?;

  let mut tx = state.store.begin().await?;
  let mut invoice = tx
    .lock_invoice(number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", number)))?;
  let now = Utc::now();
  invoice.document_url = Some(url.clone());
  invoice.updated_at = now;
  tx.update_invoice(&invoice).await?;

  if let Some(mut order) = tx.lock_order(invoice.order_id).await? {
    order.invoice_url = Some(url.clone());
    order.updated_at = now;
    tx.update_order(&order).await?;
  }
  tx.commit().await?;

  event!(Level::INFO, %url, "Invoice document stored.");
  Ok(invoice)
}
