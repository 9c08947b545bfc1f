// server/src/pipelines/contexts.rs

//! Context data for the ledger pipelines and the requests that seed them.
//! Handlers receive these wrapped in `mandi_flow::ContextData`.

use crate::errors::{AppError, Result};
use crate::models::{Actor, Buyer, GatewayQr, Invoice, Order, OrderLine, Payment, PaymentStatus, Seller, ShopAddress};
use crate::services::gateway::{GatewayEvent, GatewayPayload};
use crate::state::AppState;
use crate::store::LedgerTx;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Holds the open ledger transaction between pipeline steps.
///
/// A step takes the transaction out, awaits on it, and puts it back. If a step fails
/// while holding it, the transaction is dropped and rolls back.
#[derive(Default)]
pub struct TxSlot(Mutex<Option<Box<dyn LedgerTx>>>);

impl TxSlot {
  pub fn put(&self, tx: Box<dyn LedgerTx>) {
    *self.0.lock() = Some(tx);
  }

  pub fn take(&self) -> Result<Box<dyn LedgerTx>> {
    self
      .0
      .lock()
      .take()
      .ok_or_else(|| AppError::Internal("No open ledger transaction in this pipeline".to_string()))
  }

  pub fn is_open(&self) -> bool {
    self.0.lock().is_some()
  }
}

// --- Place order ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
  /// Catalog id when it parses as a UUID; any other value marks an ad-hoc line.
  pub product_id: Option<String>,
  /// Number or numeric string.
  pub quantity: Option<JsonValue>,
  pub price: Option<Decimal>,
  pub brand: Option<String>,
  pub name: Option<String>,
  pub gst_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
  pub buyer_id: Option<Uuid>,
  pub seller_id: Option<Uuid>,
  #[serde(default)]
  pub items: Vec<OrderLineRequest>,
  pub shipping: Option<ShopAddress>,
  pub total_amount: Option<Decimal>,
  pub discount_amount: Option<Decimal>,
  pub gst_amount: Option<Decimal>,
  pub final_amount: Option<Decimal>,
}

pub struct PlaceOrderCtxData {
  pub app_state: AppState,
  pub request: PlaceOrderRequest,
  pub tx: TxSlot,
  pub buyer: Option<Buyer>,
  pub seller: Option<Seller>,
  pub catalog_lines: Vec<OrderLine>,
  pub adhoc_lines: Vec<OrderLine>,
  pub shipping_snapshot: Option<ShopAddress>,
  pub order: Option<Order>,
}

impl PlaceOrderCtxData {
  pub fn new(app_state: AppState, request: PlaceOrderRequest) -> Self {
    Self {
      app_state,
      request,
      tx: TxSlot::default(),
      buyer: None,
      seller: None,
      catalog_lines: Vec::new(),
      adhoc_lines: Vec::new(),
      shipping_snapshot: None,
      order: None,
    }
  }
}

// --- Dispatch ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
  pub note: Option<String>,
  pub courier: Option<String>,
  pub awb: Option<String>,
}

pub struct DispatchCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub actor: Actor,
  pub request: DispatchRequest,
  pub tx: TxSlot,
  pub order: Option<Order>,
  pub buyer: Option<Buyer>,
  pub seller: Option<Seller>,
  pub invoice: Option<Invoice>,
  pub qr: Option<GatewayQr>,
}

impl DispatchCtxData {
  pub fn new(app_state: AppState, order_id: Uuid, actor: Actor, request: DispatchRequest) -> Self {
    Self {
      app_state,
      order_id,
      actor,
      request,
      tx: TxSlot::default(),
      order: None,
      buyer: None,
      seller: None,
      invoice: None,
      qr: None,
    }
  }
}

// --- Gateway callback ---

pub struct PaymentEventCtxData {
  pub app_state: AppState,
  pub payload: GatewayPayload,
  pub fields: BTreeMap<String, String>,
  pub event: Option<GatewayEvent>,
  pub tx: TxSlot,
  pub invoice: Option<Invoice>,
  pub payment: Option<Payment>,
  /// Status before this event; `None` when the event created the payment row.
  pub previous_status: Option<PaymentStatus>,
  pub applied: bool,
}

impl PaymentEventCtxData {
  pub fn new(app_state: AppState, payload: GatewayPayload) -> Self {
    Self {
      app_state,
      payload,
      fields: BTreeMap::new(),
      event: None,
      tx: TxSlot::default(),
      invoice: None,
      payment: None,
      previous_status: None,
      applied: false,
    }
  }

  /// True when this event moves the payment into `captured` for the first time.
  pub fn captures_now(&self) -> bool {
    let is_captured = self.payment.as_ref().map(|p| p.status) == Some(PaymentStatus::Captured);
    is_captured && self.previous_status != Some(PaymentStatus::Captured)
  }
}
