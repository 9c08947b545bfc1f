// server/src/services/gateway.rs

//! Payment gateway seam: QR creation, callback checksums and callback payload parsing.

use crate::config::PaytmConfig;
use crate::errors::{AppError, Result};
use crate::models::{GatewayQr, PaymentStatus};
use crate::money;
use actix_web::web::Bytes;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::{event, instrument, Level};

/// Callback fields that carry the checksum and are left out of it.
const SIGNATURE_FIELDS: [&str; 2] = ["CHECKSUMHASH", "signature"];

#[async_trait]
pub trait GatewayClient: Send + Sync {
  /// Short gateway name, used as the idempotency-key prefix.
  fn name(&self) -> &str;

  /// Asks the gateway for a dynamic QR collecting `amount_minor` paise against `order_ref`.
  async fn create_qr(&self, order_ref: &str, amount_minor: i64) -> Result<GatewayQr>;

  fn verify_signature(&self, fields: &BTreeMap<String, String>) -> bool;
}

fn signed_message(fields: &BTreeMap<String, String>) -> String {
  fields
    .iter()
    .filter(|(k, _)| !SIGNATURE_FIELDS.contains(&k.as_str()))
    .map(|(_, v)| v.as_str())
    .collect::<Vec<_>>()
    .join("|")
}

/// Hex HMAC-SHA256 over the key-sorted field values (checksum fields excluded), joined by `|`.
pub fn paytm_checksum(merchant_key: &str, fields: &BTreeMap<String, String>) -> Result<String> {
  let mut mac = Hmac::<Sha256>::new_from_slice(merchant_key.as_bytes())
    .map_err(|_| AppError::Config("Gateway merchant key is unusable".to_string()))?;
  mac.update(signed_message(fields).as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of the checksum carried in `CHECKSUMHASH` (or `signature`).
pub fn verify_paytm_checksum(merchant_key: &str, fields: &BTreeMap<String, String>) -> bool {
  if merchant_key.is_empty() {
    return false;
  }
  let Some(provided) = SIGNATURE_FIELDS.iter().find_map(|k| fields.get(*k)) else {
    return false;
  };
  let Ok(provided_bytes) = hex::decode(provided.trim()) else {
    return false;
  };
  let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(merchant_key.as_bytes()) else {
    return false;
  };
  mac.update(signed_message(fields).as_bytes());
  mac.verify_slice(&provided_bytes).is_ok()
}

/// Raw callback body as received.
#[derive(Debug, Clone)]
pub enum GatewayPayload {
  Form(Bytes),
  Json(Bytes),
}

impl GatewayPayload {
  /// Flattens the body into a field map. Only top-level JSON keys are kept; scalars
  /// become their text form and nulls are dropped.
  pub fn flatten(&self) -> Result<BTreeMap<String, String>> {
    match self {
      GatewayPayload::Form(body) => serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .map(|pairs| pairs.into_iter().collect())
        .map_err(|e| AppError::MalformedPayload(format!("Unreadable form body: {}", e))),
      GatewayPayload::Json(body) => {
        let value: JsonValue = serde_json::from_slice(body)
          .map_err(|e| AppError::MalformedPayload(format!("Unreadable JSON body: {}", e)))?;
        let JsonValue::Object(map) = value else {
          return Err(AppError::MalformedPayload("JSON body must be an object".to_string()));
        };
        Ok(
          map
            .into_iter()
            .filter_map(|(k, v)| match v {
              JsonValue::Null => None,
              JsonValue::String(s) => Some((k, s)),
              other => Some((k, other.to_string())),
            })
            .collect(),
        )
      }
    }
  }
}

/// The parts of a verified callback the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
  pub raw_status: String,
  pub status: PaymentStatus,
  pub order_ref: String,
  pub amount_minor: i64,
  pub txn_id: Option<String>,
}

fn field<'a>(fields: &'a BTreeMap<String, String>, names: &[&str]) -> Option<&'a str> {
  names
    .iter()
    .find_map(|n| fields.get(*n))
    .map(|v| v.trim())
    .filter(|v| !v.is_empty())
}

impl GatewayEvent {
  /// A missing amount counts as zero; an unparsable one is malformed.
  pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self> {
    let order_ref = field(fields, &["ORDERID", "orderId"])
      .ok_or_else(|| AppError::MalformedPayload("Callback carries no order reference".to_string()))?
      .to_string();
    let raw_status = field(fields, &["STATUS", "status"]).unwrap_or_default().to_string();
    let amount_minor = match field(fields, &["TXNAMOUNT", "amount"]) {
      Some(raw) => money::parse_major_str(raw)?,
      None => 0,
    };
    Ok(Self {
      status: PaymentStatus::from_gateway(&raw_status),
      raw_status,
      order_ref,
      amount_minor,
      txn_id: field(fields, &["TXNID", "txnId"]).map(String::from),
    })
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QrCreateBody<'a> {
  mid: &'a str,
  order_id: &'a str,
  amount: String,
  business_type: &'a str,
  pos_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QrCreateHead {
  client_id: &'static str,
  version: &'static str,
  signature: String,
}

#[derive(Serialize)]
struct QrCreateRequest<'a> {
  body: QrCreateBody<'a>,
  head: QrCreateHead,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrResultInfo {
  result_status: String,
  #[serde(default)]
  result_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrCreateResponseBody {
  result_info: QrResultInfo,
  qr_code_id: Option<String>,
  qr_data: Option<String>,
  image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrCreateResponse {
  body: QrCreateResponseBody,
}

/// Paytm dynamic-QR client.
pub struct PaytmClient {
  http: reqwest::Client,
  config: PaytmConfig,
}

impl PaytmClient {
  pub fn new(config: PaytmConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Cannot build gateway HTTP client: {}", e)))?;
    Ok(Self { http, config })
  }

  fn body_signature(&self, body: &QrCreateBody<'_>) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(self.config.merchant_key.as_bytes())
      .map_err(|_| AppError::Config("Gateway merchant key is unusable".to_string()))?;
    let json = serde_json::to_vec(body).map_err(|e| AppError::Internal(e.to_string()))?;
    mac.update(&json);
    Ok(hex::encode(mac.finalize().into_bytes()))
  }
}

#[async_trait]
impl GatewayClient for PaytmClient {
  fn name(&self) -> &str {
    "paytm"
  }

  #[instrument(name = "gateway::paytm::create_qr", skip(self), err(Display))]
  async fn create_qr(&self, order_ref: &str, amount_minor: i64) -> Result<GatewayQr> {
    let body = QrCreateBody {
      mid: &self.config.merchant_id,
      order_id: order_ref,
      amount: money::format_minor(amount_minor),
      business_type: "UPI_QR_CODE",
      pos_id: "MANDI_POS",
    };
    let request = QrCreateRequest {
      head: QrCreateHead {
        client_id: "C11",
        version: "v1",
        signature: self.body_signature(&body)?,
      },
      body,
    };

    let url = format!("{}/paymentservices/qr/create", self.config.base_url.trim_end_matches('/'));
    let response = self
      .http
      .post(&url)
      .json(&request)
      .send()
      .await
      .map_err(|e| AppError::Gateway(format!("QR request failed: {}", e)))?;
    if !response.status().is_success() {
      return Err(AppError::Gateway(format!("QR request returned HTTP {}", response.status())));
    }
    let parsed: QrCreateResponse = response
      .json()
      .await
      .map_err(|e| AppError::Gateway(format!("Unreadable QR response: {}", e)))?;

    let info = &parsed.body.result_info;
    if !info.result_status.eq_ignore_ascii_case("SUCCESS") {
      return Err(AppError::Gateway(format!(
        "QR creation rejected: {}",
        info.result_msg.as_deref().unwrap_or(&info.result_status)
      )));
    }
    let (Some(qr_id), Some(qr_payload)) = (parsed.body.qr_code_id, parsed.body.qr_data) else {
      return Err(AppError::Gateway("QR response is missing the code".to_string()));
    };
    event!(Level::INFO, %order_ref, %qr_id, "Gateway QR created.");
    Ok(GatewayQr {
      qr_id,
      qr_payload,
      qr_image: parsed.body.image,
    })
  }

  fn verify_signature(&self, fields: &BTreeMap<String, String>) -> bool {
    verify_paytm_checksum(&self.config.merchant_key, fields)
  }
}
