// server/src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type as SqlxType;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "payment_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Created,
  Pending,
  Captured,
  Failed,
  Refunded,
  /// A QR-time placeholder whose invoice was settled by gateway-keyed payments.
  Superseded,
}

impl PaymentStatus {
  /// Maps a gateway status string: `TXN_SUCCESS` is captured, `PENDING` is pending,
  /// anything else is a failure.
  pub fn from_gateway(raw: &str) -> Self {
    match raw.trim().to_ascii_uppercase().as_str() {
      "TXN_SUCCESS" => PaymentStatus::Captured,
      "PENDING" => PaymentStatus::Pending,
      _ => PaymentStatus::Failed,
    }
  }
}

/// Dedup key for gateway events: `<gateway>:<order_ref>[:<txn_id>]`.
pub fn idempotency_key(gateway: &str, order_ref: &str, txn_id: Option<&str>) -> String {
  match txn_id.filter(|t| !t.is_empty()) {
    Some(txn) => format!("{}:{}:{}", gateway, order_ref, txn),
    None => format!("{}:{}", gateway, order_ref),
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: Uuid,
  pub idempotency_key: String,
  pub invoice_id: Uuid,
  pub order_id: Uuid,
  pub buyer_id: Uuid,
  pub gateway: String,
  /// Paise.
  pub amount: i64,
  pub status: PaymentStatus,
  pub gateway_order_id: Option<String>,
  pub gateway_txn_id: Option<String>,
  pub signature_verified: bool,
  pub raw_payload: Option<serde_json::Value>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Payment {
  /// Applies a redelivered or follow-up event to an existing row. A captured payment
  /// keeps its status; everything else takes the new one.
  pub fn refresh(
    &mut self,
    status: PaymentStatus,
    amount: i64,
    txn_id: Option<String>,
    raw_payload: serde_json::Value,
    at: DateTime<Utc>,
  ) {
    if self.status != PaymentStatus::Captured {
      self.status = status;
      self.amount = amount;
    }
    if txn_id.is_some() {
      self.gateway_txn_id = txn_id;
    }
    self.signature_verified = true;
    self.raw_payload = Some(raw_payload);
    self.updated_at = at;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gateway_statuses_map_to_payment_statuses() {
    assert_eq!(PaymentStatus::from_gateway("TXN_SUCCESS"), PaymentStatus::Captured);
    assert_eq!(PaymentStatus::from_gateway("txn_success"), PaymentStatus::Captured);
    assert_eq!(PaymentStatus::from_gateway("PENDING"), PaymentStatus::Pending);
    assert_eq!(PaymentStatus::from_gateway("TXN_FAILURE"), PaymentStatus::Failed);
    assert_eq!(PaymentStatus::from_gateway(""), PaymentStatus::Failed);
  }

  #[test]
  fn keys_include_txn_only_when_present() {
    assert_eq!(idempotency_key("paytm", "INV-ORD-1", None), "paytm:INV-ORD-1");
    assert_eq!(idempotency_key("paytm", "INV-ORD-1", Some("")), "paytm:INV-ORD-1");
    assert_eq!(idempotency_key("paytm", "INV-ORD-1", Some("T9")), "paytm:INV-ORD-1:T9");
  }

  #[test]
  fn captured_is_never_downgraded() {
    let now = Utc::now();
    let mut payment = Payment {
      id: Uuid::new_v4(),
      idempotency_key: "paytm:INV-1".into(),
      invoice_id: Uuid::new_v4(),
      order_id: Uuid::new_v4(),
      buyer_id: Uuid::new_v4(),
      gateway: "paytm".into(),
      amount: 1000,
      status: PaymentStatus::Captured,
      gateway_order_id: Some("INV-1".into()),
      gateway_txn_id: None,
      signature_verified: true,
      raw_payload: None,
      created_at: now,
      updated_at: now,
    };
    payment.refresh(PaymentStatus::Failed, 0, Some("T2".into()), serde_json::json!({"STATUS": "TXN_FAILURE"}), now);
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(payment.amount, 1000);
    assert_eq!(payment.gateway_txn_id.as_deref(), Some("T2"));
  }
}
