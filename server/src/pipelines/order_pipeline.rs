// server/src/pipelines/order_pipeline.rs

//! Order placement: validate the request, resolve catalog lines, build ad-hoc lines,
//! snapshot shipping, compute totals and persist the order in one ledger scope.

use crate::errors::{AppError, Result};
use crate::models::order::{OrderTotals, TotalsOverride};
use crate::models::{Order, OrderLine, Product};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{OrderLineRequest, PlaceOrderCtxData, PlaceOrderRequest};
use crate::state::AppState;
use chrono::Utc;
use mandi_flow::{ContextData, FlowRegistry, Pipeline, PipelineControl, PipelineResult, SkipCondition, StepPolicy};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub fn register_place_order_pipeline(flows: &FlowRegistry<AppError>) {
  let no_catalog_lines: SkipCondition<PlaceOrderCtxData> =
    Arc::new(|ctx: ContextData<PlaceOrderCtxData>| ctx.read().request.items.iter().all(|l| catalog_id(l).is_none()));
  let no_shipping_override: SkipCondition<PlaceOrderCtxData> =
    Arc::new(|ctx: ContextData<PlaceOrderCtxData>| ctx.read().request.shipping.is_none());

  let mut p = Pipeline::<PlaceOrderCtxData, AppError>::new(&[
    ("validate_request", StepPolicy::Required, None),
    ("open_scope", StepPolicy::Required, None),
    ("load_parties", StepPolicy::Required, None),
    ("resolve_catalog_lines", StepPolicy::Required, Some(no_catalog_lines)),
    ("build_adhoc_lines", StepPolicy::Required, None),
    ("save_shipping_address", StepPolicy::Required, Some(no_shipping_override)),
    ("assemble_order", StepPolicy::Required, None),
    ("persist_order", StepPolicy::Required, None),
    ("commit", StepPolicy::Required, None),
  ]);

  p.on_step("validate_request", validate_request);
  p.on_step("open_scope", common_steps::open_scope::<PlaceOrderCtxData>);
  p.on_step("load_parties", load_parties);
  p.on_step("resolve_catalog_lines", resolve_catalog_lines);
  p.on_step("build_adhoc_lines", build_adhoc_lines);
  p.on_step("save_shipping_address", save_shipping_address);
  p.on_step("assemble_order", assemble_order);
  p.on_step("persist_order", persist_order);
  p.on_step("commit", common_steps::commit_scope::<PlaceOrderCtxData>);

  flows.register_pipeline(p);
}

/// Places an order and returns it as persisted.
#[instrument(name = "orders::place", skip_all, fields(buyer_id = ?request.buyer_id), err(Display))]
pub async fn place_order(state: &AppState, request: PlaceOrderRequest) -> Result<Order> {
  let ctx = ContextData::new(PlaceOrderCtxData::new(state.clone(), request));

  match state.flows.run(ctx.clone()).await? {
    PipelineResult::Completed => {
      let order = ctx.write().order.take();
      let order = order.ok_or_else(|| AppError::Internal("Order pipeline finished without an order".to_string()))?;
      event!(Level::INFO, order_id = %order.id, order_number = ?order.order_number, "Order placed.");
      Ok(order)
    }
    PipelineResult::Stopped => Err(AppError::Internal("Order pipeline stopped early".to_string())),
  }
}

/// A line's catalog id, when its product id parses as a UUID.
fn catalog_id(line: &OrderLineRequest) -> Option<Uuid> {
  line
    .product_id
    .as_deref()
    .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
}

/// Accepts a number or a numeric string; anything missing, unparsable or below one
/// becomes a single unit.
pub(crate) fn coerce_quantity(raw: Option<&JsonValue>) -> i32 {
  let parsed = match raw {
    Some(JsonValue::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
    Some(JsonValue::String(s)) => {
      let s = s.trim();
      s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
    }
    _ => None,
  };
  match parsed {
    Some(q) if q >= 1 => i32::try_from(q).unwrap_or(i32::MAX),
    _ => 1,
  }
}

fn non_blank(value: &Option<String>) -> Option<String> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn catalog_line(product: &Product, request: &OrderLineRequest) -> Result<OrderLine> {
  OrderLine::new(
    Some(product.id),
    Some(product.name.clone()),
    coerce_quantity(request.quantity.as_ref()),
    product.effective_price(),
    non_blank(&request.brand).or_else(|| product.brand.clone()),
    product.gst_rate,
  )
}

fn adhoc_line(request: &OrderLineRequest) -> Result<OrderLine> {
  OrderLine::new(
    None,
    non_blank(&request.name).or_else(|| non_blank(&request.product_id)),
    coerce_quantity(request.quantity.as_ref()),
    request.price.unwrap_or(Decimal::ZERO),
    non_blank(&request.brand),
    request.gst_rate.unwrap_or(Decimal::ZERO),
  )
}

#[instrument(name = "order_step::validate_request", skip_all, err(Display))]
async fn validate_request(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let guard = ctx_data.read();
  let request = &guard.request;

  if request.buyer_id.is_none() {
    return Err(AppError::InvalidInput("buyerId is required".to_string()));
  }
  if request.items.is_empty() {
    return Err(AppError::InvalidInput("At least one item is required".to_string()));
  }
  for (idx, line) in request.items.iter().enumerate() {
    if non_blank(&line.product_id).is_none() && line.price.is_none() {
      return Err(AppError::InvalidInput(format!(
        "Item {} needs either a productId or a price",
        idx
      )));
    }
    if line.price.map_or(false, |p| p.is_sign_negative()) {
      return Err(AppError::InvalidInput(format!("Item {} has a negative price", idx)));
    }
  }
  let overrides = [
    ("totalAmount", request.total_amount),
    ("discountAmount", request.discount_amount),
    ("gstAmount", request.gst_amount),
    ("finalAmount", request.final_amount),
  ];
  for (field, value) in overrides {
    if value.map_or(false, |v| v < Decimal::ZERO) {
      return Err(AppError::InvalidInput(format!("{} cannot be negative", field)));
    }
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::load_parties", skip_all, err(Display))]
async fn load_parties(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let (buyer_id, seller_id) = ctx_data.extract(|c| (c.request.buyer_id, c.request.seller_id));
  let buyer_id = buyer_id.ok_or_else(|| AppError::InvalidInput("buyerId is required".to_string()))?;

  let mut tx = ctx_data.read().tx.take()?;
  let buyer = tx
    .find_buyer(buyer_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Buyer {} not found", buyer_id)))?;
  let seller = match seller_id {
    Some(id) => Some(
      tx.find_seller(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Seller {} not found", id)))?,
    ),
    None => None,
  };

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  guard.buyer = Some(buyer);
  guard.seller = seller;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::resolve_catalog_lines", skip_all, err(Display))]
async fn resolve_catalog_lines(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let requested: Vec<(Uuid, OrderLineRequest)> = ctx_data.extract(|c| {
    c.request
      .items
      .iter()
      .filter_map(|line| catalog_id(line).map(|id| (id, line.clone())))
      .collect()
  });
  let mut ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
  ids.sort_unstable();
  ids.dedup();

  let mut tx = ctx_data.read().tx.take()?;
  let products = tx.find_products(&ids).await?;
  ctx_data.read().tx.put(tx);

  let by_id: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();
  let mut lines = Vec::with_capacity(requested.len());
  for (id, request) in &requested {
    match by_id.get(id) {
      Some(product) => lines.push(catalog_line(product, request)?),
      None => event!(Level::DEBUG, product_id = %id, "Unknown catalog product; line dropped."),
    }
  }
  event!(Level::DEBUG, requested = requested.len(), resolved = lines.len(), "Catalog lines resolved.");

  ctx_data.write().catalog_lines = lines;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::build_adhoc_lines", skip_all, err(Display))]
async fn build_adhoc_lines(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let mut guard = ctx_data.write();
  let lines = guard
    .request
    .items
    .iter()
    .filter(|line| catalog_id(line).is_none())
    .map(adhoc_line)
    .collect::<Result<Vec<OrderLine>>>()?;
  guard.adhoc_lines = lines;
  Ok(PipelineControl::Continue)
}

/// A shipping address on the request also becomes the buyer's saved shop address.
#[instrument(name = "order_step::save_shipping_address", skip_all, err(Display))]
async fn save_shipping_address(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let (buyer_id, address) = ctx_data.extract(|c| (c.request.buyer_id, c.request.shipping.clone()));
  let (Some(buyer_id), Some(address)) = (buyer_id, address) else {
    return Ok(PipelineControl::Continue);
  };

  let mut tx = ctx_data.read().tx.take()?;
  tx.update_buyer_address(buyer_id, &address).await?;

  let mut guard = ctx_data.write();
  guard.tx.put(tx);
  if let Some(buyer) = guard.buyer.as_mut() {
    buyer.shop_address = Some(address);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::assemble_order", skip_all, err(Display))]
async fn assemble_order(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let mut guard = ctx_data.write();

  let mut lines = std::mem::take(&mut guard.catalog_lines);
  lines.append(&mut guard.adhoc_lines);
  if lines.is_empty() {
    return Err(AppError::InvalidInput("None of the requested items could be resolved".to_string()));
  }

  let overrides = TotalsOverride {
    total_amount: guard.request.total_amount,
    discount_amount: guard.request.discount_amount,
    gst_amount: guard.request.gst_amount,
    final_amount: guard.request.final_amount,
  };
  let totals = OrderTotals::compute(&lines, &overrides)?;

  let (buyer_id, saved_address) = match guard.buyer.as_ref() {
    Some(buyer) => (buyer.id, buyer.shop_address.clone()),
    None => return Err(AppError::Internal("Buyer was not loaded".to_string())),
  };
  let shipping = guard.request.shipping.clone().or(saved_address);
  let seller_id = guard.seller.as_ref().map(|s| s.id);

  let order = Order::place(buyer_id, seller_id, lines, totals, shipping.clone(), Utc::now());
  guard.shipping_snapshot = shipping;
  guard.order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "order_step::persist_order", skip_all, err(Display))]
async fn persist_order(ctx_data: ContextData<PlaceOrderCtxData>) -> Result<PipelineControl> {
  let order = ctx_data
    .extract(|c| c.order.clone())
    .ok_or_else(|| AppError::Internal("Order was not assembled".to_string()))?;

  let mut tx = ctx_data.read().tx.take()?;
  tx.insert_order(&order).await?;
  ctx_data.read().tx.put(tx);
  Ok(PipelineControl::Continue)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn quantities_are_coerced_to_at_least_one() {
    assert_eq!(coerce_quantity(Some(&json!(3))), 3);
    assert_eq!(coerce_quantity(Some(&json!("4"))), 4);
    assert_eq!(coerce_quantity(Some(&json!(" 2 "))), 2);
    assert_eq!(coerce_quantity(Some(&json!(2.9))), 2);
    assert_eq!(coerce_quantity(Some(&json!(0))), 1);
    assert_eq!(coerce_quantity(Some(&json!(-5))), 1);
    assert_eq!(coerce_quantity(Some(&json!("lots"))), 1);
    assert_eq!(coerce_quantity(Some(&json!(null))), 1);
    assert_eq!(coerce_quantity(None), 1);
  }

  #[test]
  fn only_uuid_product_ids_count_as_catalog_lines() {
    let id = Uuid::new_v4();
    let catalog = OrderLineRequest {
      product_id: Some(id.to_string()),
      ..Default::default()
    };
    let adhoc = OrderLineRequest {
      product_id: Some("SKU-991".to_string()),
      price: Some(Decimal::new(12050, 2)),
      ..Default::default()
    };
    assert_eq!(catalog_id(&catalog), Some(id));
    assert_eq!(catalog_id(&adhoc), None);
  }

  #[test]
  fn adhoc_lines_fall_back_to_the_raw_id_for_a_name() {
    let line = adhoc_line(&OrderLineRequest {
      product_id: Some("SKU-991".to_string()),
      quantity: Some(json!("2")),
      price: Some(Decimal::new(12050, 2)),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(line.product_id, None);
    assert_eq!(line.name.as_deref(), Some("SKU-991"));
    assert_eq!(line.quantity, 2);
    assert_eq!(line.line_total, Decimal::new(24100, 2));
    assert_eq!(line.gst_rate, Decimal::ZERO);
  }
}
