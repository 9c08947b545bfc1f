// server/src/models/order.rs

use crate::errors::{AppError, Result};
use crate::models::buyer::ShopAddress;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "order_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Confirmed,
  Dispatched,
  Delivered,
  Cancelled,
  Returned,
}

impl OrderStatus {
  pub fn audit_action(self) -> &'static str {
    match self {
      OrderStatus::Confirmed => "CONFIRMED",
      OrderStatus::Dispatched => "DISPATCHED",
      OrderStatus::Delivered => "DELIVERED",
      OrderStatus::Cancelled => "CANCELLED",
      OrderStatus::Returned => "RETURNED",
    }
  }

  /// Transitions allowed through the generic status update. Dispatch has its own operation.
  pub fn can_become(self, next: OrderStatus) -> bool {
    matches!(
      (self, next),
      (OrderStatus::Dispatched, OrderStatus::Delivered)
        | (OrderStatus::Delivered, OrderStatus::Returned)
        | (OrderStatus::Confirmed, OrderStatus::Cancelled)
    )
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "order_payment_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
  Unpaid,
  Partial,
  Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub product_id: Option<Uuid>,
  pub name: Option<String>,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub line_total: Decimal,
  pub brand: Option<String>,
  pub gst_rate: Decimal,
}

impl OrderLine {
  pub fn new(
    product_id: Option<Uuid>,
    name: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    brand: Option<String>,
    gst_rate: Decimal,
  ) -> Result<Self> {
    let line_total = unit_price.checked_mul(Decimal::from(quantity)).ok_or_else(|| {
      AppError::InvalidInput(format!("Line total of {} x {} is out of range", quantity, unit_price))
    })?;
    Ok(Self {
      product_id,
      name,
      quantity,
      unit_price,
      line_total,
      brand: brand.filter(|b| !b.trim().is_empty()),
      gst_rate,
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchInfo {
  pub courier: Option<String>,
  pub awb: Option<String>,
  pub note: Option<String>,
  pub dispatched_at: DateTime<Utc>,
  pub dispatched_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
  pub at: DateTime<Utc>,
  pub actor: String,
  pub action: String,
  pub note: Option<String>,
}

/// Caller-supplied rollup overrides, all in rupees.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsOverride {
  pub total_amount: Option<Decimal>,
  pub discount_amount: Option<Decimal>,
  pub gst_amount: Option<Decimal>,
  pub final_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
  pub total_amount: Decimal,
  pub discount_amount: Decimal,
  pub gst_amount: Decimal,
  pub final_amount: Decimal,
}

impl OrderTotals {
  /// Rollups from the lines and any overrides. The line sum is always checked, even when
  /// `total_amount` is overridden, and the final amount may never be negative.
  pub fn compute(lines: &[OrderLine], overrides: &TotalsOverride) -> Result<Self> {
    let out_of_range = || AppError::InvalidInput("Order total is out of range".to_string());

    let line_sum = lines
      .iter()
      .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total))
      .ok_or_else(out_of_range)?;
    let total_amount = overrides.total_amount.unwrap_or(line_sum);
    let discount_amount = overrides.discount_amount.unwrap_or(Decimal::ZERO);
    let gst_amount = overrides.gst_amount.unwrap_or(Decimal::ZERO);
    let final_amount = match overrides.final_amount {
      Some(amount) => amount,
      None => total_amount
        .checked_sub(discount_amount)
        .and_then(|net| net.checked_add(gst_amount))
        .ok_or_else(out_of_range)?,
    };
    if final_amount < Decimal::ZERO {
      return Err(AppError::InvalidInput(format!(
        "Final amount {} is negative; the discount exceeds the order total",
        final_amount
      )));
    }

    Ok(Self {
      total_amount,
      discount_amount,
      gst_amount,
      final_amount,
    })
  }
}

/// Per-brand sum of line totals; lines without a brand are left out.
pub fn brand_totals(lines: &[OrderLine]) -> BTreeMap<String, Decimal> {
  let mut totals = BTreeMap::new();
  for line in lines {
    if let Some(brand) = &line.brand {
      let sum = totals.entry(brand.clone()).or_insert(Decimal::ZERO);
      *sum = sum.saturating_add(line.line_total);
    }
  }
  totals
}

/// `ORD-YYYYMMDD-XXXXXXXX`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
  let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
  format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: Option<String>,
  pub buyer_id: Uuid,
  pub seller_id: Option<Uuid>,
  pub items: Vec<OrderLine>,
  pub brand_totals: BTreeMap<String, Decimal>,
  pub total_amount: Decimal,
  pub discount_amount: Decimal,
  pub gst_amount: Decimal,
  pub final_amount: Decimal,
  pub shipping_address: Option<ShopAddress>,
  pub status: OrderStatus,
  pub payment_status: OrderPaymentStatus,
  pub dispatch: Option<DispatchInfo>,
  pub audit_trail: Vec<AuditEntry>,
  pub invoice_id: Option<Uuid>,
  pub invoice_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// A freshly placed order: `confirmed`, `unpaid`, empty audit trail.
  pub fn place(
    buyer_id: Uuid,
    seller_id: Option<Uuid>,
    items: Vec<OrderLine>,
    totals: OrderTotals,
    shipping_address: Option<ShopAddress>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_number: Some(generate_order_number(now)),
      buyer_id,
      seller_id,
      brand_totals: brand_totals(&items),
      items,
      total_amount: totals.total_amount,
      discount_amount: totals.discount_amount,
      gst_amount: totals.gst_amount,
      final_amount: totals.final_amount,
      shipping_address,
      status: OrderStatus::Confirmed,
      payment_status: OrderPaymentStatus::Unpaid,
      dispatch: None,
      audit_trail: Vec::new(),
      invoice_id: None,
      invoice_url: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn ensure_dispatchable(&self) -> Result<()> {
    if self.status != OrderStatus::Confirmed {
      return Err(AppError::InvalidState(format!(
        "Order {} is {:?} and cannot be dispatched",
        self.id, self.status
      )));
    }
    Ok(())
  }

  pub fn mark_dispatched(
    &mut self,
    actor: &str,
    courier: Option<String>,
    awb: Option<String>,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<()> {
    self.ensure_dispatchable()?;
    self.status = OrderStatus::Dispatched;
    self.dispatch = Some(DispatchInfo {
      courier,
      awb,
      note: note.clone(),
      dispatched_at: at,
      dispatched_by: actor.to_string(),
    });
    self.record(actor, OrderStatus::Dispatched.audit_action(), note, at);
    Ok(())
  }

  /// Generic status change outside dispatch.
  pub fn transition(&mut self, next: OrderStatus, actor: &str, note: Option<String>, at: DateTime<Utc>) -> Result<()> {
    if next == OrderStatus::Dispatched {
      return Err(AppError::InvalidState(
        "Orders are dispatched through the dispatch operation".to_string(),
      ));
    }
    if !self.status.can_become(next) {
      return Err(AppError::InvalidState(format!(
        "Order {} cannot move from {:?} to {:?}",
        self.id, self.status, next
      )));
    }
    self.status = next;
    self.record(actor, next.audit_action(), note, at);
    Ok(())
  }

  fn record(&mut self, actor: &str, action: &str, note: Option<String>, at: DateTime<Utc>) {
    self.audit_trail.push(AuditEntry {
      at,
      actor: actor.to_string(),
      action: action.to_string(),
      note,
    });
    self.updated_at = at;
  }
}
