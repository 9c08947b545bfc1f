// server/src/pipelines/dispatch_pipeline.rs

//! Dispatch: mark the order dispatched, issue its invoice, attach a gateway QR and
//! render the invoice document.
//!
//! Everything up to `commit` shares one ledger scope. The QR request and the document
//! render are best-effort: a gateway or renderer outage still leaves a dispatched order
//! with a committed invoice, and both can be retried later.

use crate::errors::{AppError, Result};
use crate::models::{Actor, Invoice, Order};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{DispatchCtxData, DispatchRequest};
use crate::services::billing;
use crate::state::AppState;
use chrono::Utc;
use mandi_flow::{ContextData, FlowRegistry, Pipeline, PipelineControl, PipelineResult, SkipCondition, StepPolicy};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub fn register_dispatch_pipeline(flows: &FlowRegistry<AppError>) {
  let nothing_due: SkipCondition<DispatchCtxData> =
    Arc::new(|ctx: ContextData<DispatchCtxData>| !ctx.read().invoice.as_ref().map_or(false, Invoice::wants_qr));
  let no_qr: SkipCondition<DispatchCtxData> = Arc::new(|ctx: ContextData<DispatchCtxData>| ctx.read().qr.is_none());

  let mut p = Pipeline::<DispatchCtxData, AppError>::new(&[
    ("authorize_actor", StepPolicy::Required, None),
    ("open_scope", StepPolicy::Required, None),
    ("lock_order", StepPolicy::Required, None),
    ("load_parties", StepPolicy::Required, None),
    ("mark_dispatched", StepPolicy::Required, None),
    ("issue_invoice", StepPolicy::Required, None),
    ("request_qr", StepPolicy::BestEffort, Some(nothing_due)),
    ("attach_qr", StepPolicy::Required, Some(no_qr)),
    ("commit", StepPolicy::Required, None),
    ("render_document", StepPolicy::BestEffort, None),
  ]);

  p.on_step("authorize_actor", authorize_actor);
  p.on_step("open_scope", common_steps::open_scope::<DispatchCtxData>);
  p.on_step("lock_order", lock_order);
  p.on_step("load_parties", load_parties);
  p.on_step("mark_dispatched", mark_dispatched);
  p.on_step("issue_invoice", issue_invoice);
  p.on_step("request_qr", request_qr);
  p.on_step("attach_qr", attach_qr);
  p.on_step("commit", common_steps::commit_scope::<DispatchCtxData>);
  p.on_step("render_document", render_document);

  flows.register_pipeline(p);
}

/// Dispatches an order and returns it together with its new invoice.
#[instrument(name = "orders::dispatch", skip(state, actor, request), fields(actor = %actor.id), err(Display))]
pub async fn dispatch_order(
  state: &AppState,
  order_id: Uuid,
  actor: Actor,
  request: DispatchRequest,
) -> Result<(Order, Invoice)> {
  let ctx = ContextData::new(DispatchCtxData::new(state.clone(), order_id, actor, request));

  match state.flows.run(ctx.clone()).await? {
    PipelineResult::Completed => {
      let (order, invoice) = {
        let mut guard = ctx.write();
        (guard.order.take(), guard.invoice.take())
      };
      match (order, invoice) {
        (Some(order), Some(invoice)) => {
          event!(Level::INFO, invoice = %invoice.number, grand_total = invoice.grand_total, "Order dispatched.");
          Ok((order, invoice))
        }
        _ => Err(AppError::Internal("Dispatch pipeline finished without an invoice".to_string())),
      }
    }
    PipelineResult::Stopped => Err(AppError::Internal("Dispatch pipeline stopped early".to_string())),
  }
}

#[instrument(name = "dispatch_step::authorize_actor", skip_all, err(Display))]
async fn authorize_actor(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let actor = ctx_data.extract(|c| c.actor.clone());
  if !actor.role.handles_fulfilment() {
    return Err(AppError::Forbidden(format!(
      "Role {:?} cannot dispatch orders",
      actor.role
    )));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "dispatch_step::lock_order", skip_all, err(Display))]
async fn lock_order(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let order_id = ctx_data.extract(|c| c.order_id);

  let mut tx = ctx_data.read().tx.take()?;
  let order = tx
    .lock_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  order.ensure_dispatchable()?;

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "dispatch_step::load_parties", skip_all, err(Display))]
async fn load_parties(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let (buyer_id, seller_id) = ctx_data
    .extract(|c| c.order.as_ref().map(|o| (o.buyer_id, o.seller_id)))
    .ok_or_else(|| AppError::Internal("Order was not loaded".to_string()))?;

  let mut tx = ctx_data.read().tx.take()?;
  let buyer = tx
    .find_buyer(buyer_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Buyer {} not found", buyer_id)))?;
  let seller = match seller_id {
    Some(id) => {
      let seller = tx.find_seller(id).await?;
      if seller.is_none() {
        event!(Level::WARN, seller_id = %id, "Order references a missing seller; invoicing without one.");
      }
      seller
    }
    None => None,
  };

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.buyer = Some(buyer);
  guard.seller = seller;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "dispatch_step::mark_dispatched", skip_all, err(Display))]
async fn mark_dispatched(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let mut guard = ctx_data.write();
  let actor_id = guard.actor.id.clone();
  let DispatchRequest { note, courier, awb } = guard.request.clone();

  let order = guard
    .order
    .as_mut()
    .ok_or_else(|| AppError::Internal("Order was not loaded".to_string()))?;
  order.mark_dispatched(&actor_id, courier, awb, note, Utc::now())?;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "dispatch_step::issue_invoice", skip_all, err(Display))]
async fn issue_invoice(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let (mut order, invoice) = {
    let guard = ctx_data.read();
    let order = guard
      .order
      .clone()
      .ok_or_else(|| AppError::Internal("Order was not loaded".to_string()))?;
    let buyer = guard
      .buyer
      .as_ref()
      .ok_or_else(|| AppError::Internal("Buyer was not loaded".to_string()))?;
    let invoice = Invoice::from_order(&order, buyer, guard.seller.as_ref(), Utc::now())?;
    (order, invoice)
  };
  order.invoice_id = Some(invoice.id);

  let mut tx = ctx_data.read().tx.take()?;
  tx.insert_invoice(&invoice).await?;
  tx.update_order(&order).await?;
  event!(Level::INFO, invoice = %invoice.number, grand_total = invoice.grand_total, "Invoice issued.");

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.order = Some(order);
  guard.invoice = Some(invoice);
  Ok(PipelineControl::Continue)
}

/// Only talks to the gateway; the QR is written to the ledger by `attach_qr`.
#[instrument(name = "dispatch_step::request_qr", skip_all, err(Display))]
async fn request_qr(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let (gateway, number, amount) = {
    let guard = ctx_data.read();
    let invoice = guard
      .invoice
      .as_ref()
      .ok_or_else(|| AppError::Internal("Invoice was not issued".to_string()))?;
    (guard.app_state.gateway.clone(), invoice.number.clone(), invoice.balance_due)
  };

  let qr = gateway.create_qr(&number, amount).await?;
  event!(Level::DEBUG, qr_id = %qr.qr_id, "Gateway QR received.");
  ctx_data.write().qr = Some(qr);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "dispatch_step::attach_qr", skip_all, err(Display))]
async fn attach_qr(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let now = Utc::now();
  let (mut invoice, qr, gateway_name) = {
    let mut guard = ctx_data.write();
    let invoice = guard
      .invoice
      .clone()
      .ok_or_else(|| AppError::Internal("Invoice was not issued".to_string()))?;
    let qr = guard
      .qr
      .take()
      .ok_or_else(|| AppError::Internal("No QR to attach".to_string()))?;
    (invoice, qr, guard.app_state.gateway.name().to_string())
  };
  if !invoice.attach_qr(qr, now) {
    return Ok(PipelineControl::Continue);
  }

  let mut tx = ctx_data.read().tx.take()?;
  tx.update_invoice(&invoice).await?;
  tx.claim_payment(&billing::qr_payment(&invoice, &gateway_name, now)).await?;

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.invoice = Some(invoice);
  Ok(PipelineControl::Continue)
}

/// Runs after the commit; a failure leaves the invoice without a document URL.
#[instrument(name = "dispatch_step::render_document", skip_all, err(Display))]
async fn render_document(ctx_data: ContextData<DispatchCtxData>) -> Result<PipelineControl> {
  let (state, number) = {
    let guard = ctx_data.read();
    let number = guard
      .invoice
      .as_ref()
      .map(|i| i.number.clone())
      .ok_or_else(|| AppError::Internal("Invoice was not issued".to_string()))?;
    (guard.app_state.clone(), number)
  };

  let rendered = billing::render_invoice_document(&state, &number).await?;

  let mut guard = ctx_data.write();
  if let Some(order) = guard.order.as_mut() {
    order.invoice_url = rendered.document_url.clone();
    order.updated_at = rendered.updated_at;
  }
  guard.invoice = Some(rendered);
  Ok(PipelineControl::Continue)
}
