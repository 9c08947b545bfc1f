// server/src/models/invoice.rs

use crate::errors::{AppError, Result};
use crate::models::buyer::Buyer;
use crate::models::order::{Order, OrderLine, OrderPaymentStatus};
use crate::models::seller::Seller;
use crate::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "invoice_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
  Unpaid,
  PartiallyPaid,
  Paid,
  Refunded,
}

impl InvoiceStatus {
  pub fn derive(grand_total: i64, amount_paid: i64) -> Self {
    if amount_paid <= 0 {
      InvoiceStatus::Unpaid
    } else if amount_paid < grand_total {
      InvoiceStatus::PartiallyPaid
    } else {
      InvoiceStatus::Paid
    }
  }
}

/// Invoice line; money fields are paise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
  pub product_id: Option<Uuid>,
  pub name: String,
  pub brand: Option<String>,
  pub quantity: i32,
  pub unit_price: i64,
  pub line_total: i64,
  pub gst_rate: Decimal,
  pub gst_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRef {
  pub payment_id: Uuid,
  pub amount: i64,
  pub gateway: String,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayQr {
  pub qr_id: String,
  pub qr_payload: String,
  pub qr_image: Option<String>,
}

/// Copy of a buyer or seller as it stood when the invoice was cut.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
  pub id: Uuid,
  pub name: String,
  pub gstin: Option<String>,
  pub address: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
}

impl PartySnapshot {
  pub fn of_buyer(buyer: &Buyer, shipping: Option<&crate::models::ShopAddress>) -> Self {
    Self {
      id: buyer.id,
      name: buyer.name.clone(),
      gstin: buyer.gstin.clone(),
      address: shipping.or(buyer.shop_address.as_ref()).map(|a| a.one_line()),
      phone: buyer.phone.clone(),
      email: buyer.email.clone(),
    }
  }

  pub fn of_seller(seller: &Seller) -> Self {
    Self {
      id: seller.id,
      name: seller.name.clone(),
      gstin: seller.gstin.clone(),
      address: seller.address.clone(),
      phone: None,
      email: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
  pub id: Uuid,
  pub number: String,
  pub order_id: Uuid,
  pub buyer_id: Uuid,
  pub seller_id: Option<Uuid>,
  pub items: Vec<InvoiceLine>,
  pub subtotal: i64,
  pub discount_total: i64,
  pub gst_total: i64,
  pub grand_total: i64,
  pub amount_paid: i64,
  pub balance_due: i64,
  pub status: InvoiceStatus,
  pub paid_at: Option<DateTime<Utc>>,
  pub payment_refs: Vec<PaymentRef>,
  pub buyer_snapshot: PartySnapshot,
  pub seller_snapshot: Option<PartySnapshot>,
  pub qr: Option<GatewayQr>,
  pub document_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// `INV-<order_number>`, or `INV-<unix millis>` for orders without a number.
pub fn invoice_number_for(order: &Order, now: DateTime<Utc>) -> String {
  match order.order_number.as_deref().filter(|n| !n.is_empty()) {
    Some(order_number) => format!("INV-{}", order_number),
    None => format!("INV-{}", now.timestamp_millis()),
  }
}

fn line_gst(line: &OrderLine) -> Result<Decimal> {
  line
    .line_total
    .checked_mul(line.gst_rate)
    .map(|gst| gst / Decimal::from(100))
    .ok_or_else(|| AppError::InvalidInput(format!("GST on line total {} is out of range", line.line_total)))
}

impl Invoice {
  /// Cuts an unpaid invoice for a dispatched order.
  ///
  /// The grand total is the order's final amount. The discount total absorbs any gap
  /// between it and `subtotal + gst_total`, so the rollup identity always holds in paise.
  pub fn from_order(order: &Order, buyer: &Buyer, seller: Option<&Seller>, now: DateTime<Utc>) -> Result<Self> {
    let items = order
      .items
      .iter()
      .map(|line| {
        Ok(InvoiceLine {
          product_id: line.product_id,
          name: line.name.clone().unwrap_or_else(|| "Item".to_string()),
          brand: line.brand.clone(),
          quantity: line.quantity,
          unit_price: money::to_minor(line.unit_price)?,
          line_total: money::to_minor(line.line_total)?,
          gst_rate: line.gst_rate,
          gst_amount: money::to_minor(line_gst(line)?)?,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let subtotal = money::to_minor(order.total_amount)?;
    let gst_total = money::to_minor(order.gst_amount)?;
    let grand_total = money::to_minor(order.final_amount)?;
    if grand_total < 0 {
      return Err(AppError::InvalidInput(format!(
        "Order {} has a negative final amount and cannot be invoiced",
        order.id
      )));
    }
    let discount_total = subtotal
      .checked_add(gst_total)
      .and_then(|gross| gross.checked_sub(grand_total))
      .ok_or_else(|| AppError::InvalidInput(format!("Order {} totals are out of range", order.id)))?;

    Ok(Self {
      id: Uuid::new_v4(),
      number: invoice_number_for(order, now),
      order_id: order.id,
      buyer_id: order.buyer_id,
      seller_id: seller.map(|s| s.id).or(order.seller_id),
      items,
      subtotal,
      discount_total,
      gst_total,
      grand_total,
      amount_paid: 0,
      balance_due: grand_total,
      status: InvoiceStatus::Unpaid,
      paid_at: None,
      payment_refs: Vec::new(),
      buyer_snapshot: PartySnapshot::of_buyer(buyer, order.shipping_address.as_ref()),
      seller_snapshot: seller.map(PartySnapshot::of_seller),
      qr: None,
      document_url: None,
      created_at: now,
      updated_at: now,
    })
  }

  /// Records a captured payment: bumps the paid amount, recomputes balance and status,
  /// stamps `paid_at` the first time the invoice becomes paid, and appends a reference.
  pub fn apply_payment(&mut self, payment_id: Uuid, amount: i64, gateway: &str, at: DateTime<Utc>) {
    self.amount_paid = self.amount_paid.saturating_add(amount.max(0));
    self.balance_due = (self.grand_total - self.amount_paid).max(0);
    self.status = InvoiceStatus::derive(self.grand_total, self.amount_paid);
    if self.status == InvoiceStatus::Paid && self.paid_at.is_none() {
      self.paid_at = Some(at);
    }
    self.payment_refs.push(PaymentRef {
      payment_id,
      amount,
      gateway: gateway.to_string(),
      at,
    });
    self.updated_at = at;
  }

  pub fn order_payment_status(&self) -> OrderPaymentStatus {
    match self.status {
      InvoiceStatus::Paid => OrderPaymentStatus::Paid,
      _ if self.amount_paid > 0 => OrderPaymentStatus::Partial,
      _ => OrderPaymentStatus::Unpaid,
    }
  }

  /// A QR is requested at most once, and never for a settled invoice.
  pub fn wants_qr(&self) -> bool {
    self.qr.is_none() && self.status != InvoiceStatus::Paid && self.balance_due > 0
  }

  /// Returns false (and leaves the invoice alone) when a QR is no longer wanted.
  pub fn attach_qr(&mut self, qr: GatewayQr, at: DateTime<Utc>) -> bool {
    if !self.wants_qr() {
      return false;
    }
    self.qr = Some(qr);
    self.updated_at = at;
    true
  }
}
