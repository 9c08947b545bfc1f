// server/src/pipelines/payment_pipeline.rs

//! Gateway callback reconciliation.
//!
//! A verified callback is recorded against its invoice under an idempotency key, so a
//! redelivered event finds the payment it already created. The invoice balance moves
//! only when a payment becomes `captured` for the first time, and the buyer is told
//! about it after the commit.

use crate::errors::{AppError, Result};
use crate::models::payment::idempotency_key;
use crate::models::{InvoiceStatus, Payment, PaymentStatus};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::PaymentEventCtxData;
use crate::services::gateway::{GatewayEvent, GatewayPayload};
use crate::services::notifier::CapturedPayment;
use crate::state::AppState;
use crate::store::PaymentClaim;
use chrono::Utc;
use mandi_flow::{ContextData, FlowRegistry, Pipeline, PipelineControl, PipelineResult, SkipCondition, StepPolicy};
use serde::Serialize;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// What a callback did to the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
  pub payment_id: Uuid,
  pub payment_status: PaymentStatus,
  pub invoice_number: String,
  pub invoice_status: InvoiceStatus,
  pub balance_due: i64,
  /// True only for the delivery that moved the invoice balance.
  pub applied: bool,
}

pub fn register_payment_pipeline(flows: &FlowRegistry<AppError>) {
  let not_capturing: SkipCondition<PaymentEventCtxData> =
    Arc::new(|ctx: ContextData<PaymentEventCtxData>| !ctx.read().captures_now());
  let not_applied: SkipCondition<PaymentEventCtxData> =
    Arc::new(|ctx: ContextData<PaymentEventCtxData>| !ctx.read().applied);

  let mut p = Pipeline::<PaymentEventCtxData, AppError>::new(&[
    ("read_payload", StepPolicy::Required, None),
    ("verify_signature", StepPolicy::Required, None),
    ("extract_event", StepPolicy::Required, None),
    ("open_scope", StepPolicy::Required, None),
    ("lock_invoice", StepPolicy::Required, None),
    ("record_payment", StepPolicy::Required, None),
    ("apply_to_invoice", StepPolicy::Required, Some(not_capturing)),
    ("commit", StepPolicy::Required, None),
    ("notify_buyer", StepPolicy::BestEffort, Some(not_applied)),
  ]);

  p.on_step("read_payload", read_payload);
  p.on_step("verify_signature", verify_signature);
  p.on_step("extract_event", extract_event);
  p.on_step("open_scope", common_steps::open_scope::<PaymentEventCtxData>);
  p.on_step("lock_invoice", lock_invoice);
  p.on_step("record_payment", record_payment);
  p.on_step("apply_to_invoice", apply_to_invoice);
  p.on_step("commit", common_steps::commit_scope::<PaymentEventCtxData>);
  p.on_step("notify_buyer", notify_buyer);

  flows.register_pipeline(p);
}

/// Reconciles one gateway callback. Safe to call any number of times with the same payload.
#[instrument(name = "payments::handle_gateway_event", skip_all, err(Display))]
pub async fn handle_gateway_event(state: &AppState, payload: GatewayPayload) -> Result<PaymentOutcome> {
  let ctx = ContextData::new(PaymentEventCtxData::new(state.clone(), payload));

  match state.flows.run(ctx.clone()).await? {
    PipelineResult::Completed => {
      let guard = ctx.read();
      match (guard.payment.as_ref(), guard.invoice.as_ref()) {
        (Some(payment), Some(invoice)) => Ok(PaymentOutcome {
          payment_id: payment.id,
          payment_status: payment.status,
          invoice_number: invoice.number.clone(),
          invoice_status: invoice.status,
          balance_due: invoice.balance_due,
          applied: guard.applied,
        }),
        _ => Err(AppError::Internal("Payment pipeline finished without a payment".to_string())),
      }
    }
    PipelineResult::Stopped => Err(AppError::Internal("Payment pipeline stopped early".to_string())),
  }
}

#[instrument(name = "payment_step::read_payload", skip_all, err(Display))]
async fn read_payload(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let fields = ctx_data.read().payload.flatten()?;
  event!(Level::DEBUG, field_count = fields.len(), "Callback payload read.");
  ctx_data.write().fields = fields;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_step::verify_signature", skip_all, err(Display))]
async fn verify_signature(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let guard = ctx_data.read();
  if !guard.app_state.gateway.verify_signature(&guard.fields) {
    event!(Level::WARN, order_ref = ?guard.fields.get("ORDERID"), "Callback signature rejected.");
    return Err(AppError::InvalidSignature("Callback checksum does not match".to_string()));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_step::extract_event", skip_all, err(Display))]
async fn extract_event(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let event = GatewayEvent::from_fields(&ctx_data.read().fields)?;
  event!(
    Level::INFO,
    order_ref = %event.order_ref,
    status = %event.raw_status,
    amount_minor = event.amount_minor,
    txn_id = ?event.txn_id,
    "Gateway event received."
  );
  ctx_data.write().event = Some(event);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_step::lock_invoice", skip_all, err(Display))]
async fn lock_invoice(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let order_ref = ctx_data
    .extract(|c| c.event.as_ref().map(|e| e.order_ref.clone()))
    .ok_or_else(|| AppError::Internal("Gateway event was not extracted".to_string()))?;

  let mut tx = ctx_data.read().tx.take()?;
  let invoice = tx
    .lock_invoice(&order_ref)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", order_ref)))?;

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.invoice = Some(invoice);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_step::record_payment", skip_all, err(Display))]
async fn record_payment(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let now = Utc::now();
  let (candidate, event, raw_payload) = {
    let guard = ctx_data.read();
    let event = guard
      .event
      .clone()
      .ok_or_else(|| AppError::Internal("Gateway event was not extracted".to_string()))?;
    let invoice = guard
      .invoice
      .as_ref()
      .ok_or_else(|| AppError::Internal("Invoice was not locked".to_string()))?;
    let gateway = guard.app_state.gateway.name().to_string();
    let raw_payload = serde_json::to_value(&guard.fields)
      .map_err(|e| AppError::Internal(format!("Callback fields not serializable: {}", e)))?;

    let candidate = Payment {
      id: Uuid::new_v4(),
      idempotency_key: idempotency_key(&gateway, &event.order_ref, event.txn_id.as_deref()),
      invoice_id: invoice.id,
      order_id: invoice.order_id,
      buyer_id: invoice.buyer_id,
      gateway,
      amount: event.amount_minor,
      status: event.status,
      gateway_order_id: Some(event.order_ref.clone()),
      gateway_txn_id: event.txn_id.clone(),
      signature_verified: true,
      raw_payload: Some(raw_payload.clone()),
      created_at: now,
      updated_at: now,
    };
    (candidate, event, raw_payload)
  };

  let mut tx = ctx_data.read().tx.take()?;
  let (payment, previous_status) = match tx.claim_payment(&candidate).await? {
    PaymentClaim::Created(payment) => {
      event!(Level::INFO, payment_id = %payment.id, status = ?payment.status, "Payment recorded.");
      (payment, None)
    }
    PaymentClaim::Existing(mut payment) => {
      let previous = payment.status;
      payment.refresh(event.status, event.amount_minor, event.txn_id.clone(), raw_payload, now);
      tx.update_payment(&payment).await?;
      event!(
        Level::INFO,
        payment_id = %payment.id,
        from = ?previous,
        to = ?payment.status,
        "Existing payment refreshed."
      );
      (payment, Some(previous))
    }
  };

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.payment = Some(payment);
  guard.previous_status = previous_status;
  Ok(PipelineControl::Continue)
}

/// Moves the invoice balance and mirrors the invoice state onto the order.
#[instrument(name = "payment_step::apply_to_invoice", skip_all, err(Display))]
async fn apply_to_invoice(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let now = Utc::now();
  let (mut invoice, payment_key, gateway) = {
    let guard = ctx_data.read();
    let payment = guard
      .payment
      .as_ref()
      .ok_or_else(|| AppError::Internal("Payment was not recorded".to_string()))?;
    let mut invoice = guard
      .invoice
      .clone()
      .ok_or_else(|| AppError::Internal("Invoice was not locked".to_string()))?;
    invoice.apply_payment(payment.id, payment.amount, &payment.gateway, now);
    (invoice, payment.idempotency_key.clone(), payment.gateway.clone())
  };

  let mut tx = ctx_data.read().tx.take()?;
  tx.update_invoice(&invoice).await?;
  match tx.lock_order(invoice.order_id).await? {
    Some(mut order) => {
      order.payment_status = invoice.order_payment_status();
      order.updated_at = now;
      tx.update_order(&order).await?;
    }
    None => event!(Level::WARN, order_id = %invoice.order_id, "Invoice points at a missing order."),
  }

  // A settled invoice no longer needs its QR-time placeholder.
  let placeholder_key = idempotency_key(&gateway, &invoice.number, None);
  if invoice.status == InvoiceStatus::Paid && payment_key != placeholder_key {
    if let Some(mut placeholder) = tx.lock_payment(&placeholder_key).await? {
      if placeholder.status == PaymentStatus::Created {
        placeholder.status = PaymentStatus::Superseded;
        placeholder.updated_at = now;
        tx.update_payment(&placeholder).await?;
        event!(Level::DEBUG, payment_id = %placeholder.id, "QR placeholder superseded.");
      }
    }
  }
  event!(
    Level::INFO,
    invoice = %invoice.number,
    amount_paid = invoice.amount_paid,
    balance_due = invoice.balance_due,
    status = ?invoice.status,
    "Payment applied to invoice."
  );
  invoice.updated_at = now;

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.invoice = Some(invoice);
  guard.applied = true;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_step::notify_buyer", skip_all, err(Display))]
async fn notify_buyer(ctx_data: ContextData<PaymentEventCtxData>) -> Result<PipelineControl> {
  let (hook, captured) = {
    let guard = ctx_data.read();
    match (guard.payment.as_ref(), guard.invoice.as_ref()) {
      (Some(payment), Some(invoice)) => (
        guard.app_state.post_payment.clone(),
        CapturedPayment {
          payment_id: payment.id,
          buyer_id: invoice.buyer_id,
          order_id: invoice.order_id,
          invoice_number: invoice.number.clone(),
          amount_minor: payment.amount,
          balance_due: invoice.balance_due,
          invoice_status: invoice.status,
        },
      ),
      _ => return Err(AppError::Internal("Nothing to notify about".to_string())),
    }
  };

  hook.on_captured(&captured).await?;
  Ok(PipelineControl::Continue)
}
