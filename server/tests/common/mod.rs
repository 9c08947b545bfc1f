// tests/common/mod.rs
#![allow(dead_code)]

use actix_web::web::Bytes;
use async_trait::async_trait;
use mandi_server::config::AppConfig;
use mandi_server::errors::{AppError, Result};
use mandi_server::models::{
  Actor, ActorRole, Buyer, GatewayQr, NewBuyer, NewProduct, NewSeller, Order, Product, Seller, ShopAddress,
};
use mandi_server::money::format_minor;
use mandi_server::pipelines::contexts::{OrderLineRequest, PlaceOrderRequest};
use mandi_server::pipelines::place_order;
use mandi_server::services::gateway::{paytm_checksum, verify_paytm_checksum, GatewayClient, GatewayPayload};
use mandi_server::services::notifier::BuyerNotifier;
use mandi_server::services::renderer::{ArtifactStore, LocalArtifactStore, TextPdfRenderer};
use mandi_server::state::{AppState, Services};
use mandi_server::store::{LedgerStore, MemoryLedgerStore};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::Level;

pub const MERCHANT_KEY: &str = "test-merchant-key-0001";

/// Gateway double: hands out predictable QRs and checks callbacks with the real checksum.
#[derive(Default)]
pub struct StubGateway {
  pub fail_qr: AtomicBool,
  pub qr_calls: AtomicUsize,
}

impl StubGateway {
  pub fn qr_calls(&self) -> usize {
    self.qr_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl GatewayClient for StubGateway {
  fn name(&self) -> &str {
    "paytm"
  }

  async fn create_qr(&self, order_ref: &str, amount_minor: i64) -> Result<GatewayQr> {
    self.qr_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_qr.load(Ordering::SeqCst) {
      return Err(AppError::Gateway("stub gateway unavailable".to_string()));
    }
    Ok(GatewayQr {
      qr_id: format!("QR-{}", order_ref),
      qr_payload: format!("upi://pay?tr={}&am={}", order_ref, format_minor(amount_minor)),
      qr_image: None,
    })
  }

  fn verify_signature(&self, fields: &BTreeMap<String, String>) -> bool {
    verify_paytm_checksum(MERCHANT_KEY, fields)
  }
}

/// Local artifact store that can be told to fail writes.
pub struct FlakyArtifacts {
  inner: LocalArtifactStore,
  pub fail: AtomicBool,
}

#[async_trait]
impl ArtifactStore for FlakyArtifacts {
  async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(AppError::Internal("artifact store offline".to_string()));
    }
    self.inner.put(name, bytes).await
  }

  async fn get(&self, name: &str) -> Result<Vec<u8>> {
    self.inner.get(name).await
  }
}

pub struct TestApp {
  pub state: AppState,
  pub gateway: Arc<StubGateway>,
  pub artifacts: Arc<FlakyArtifacts>,
  _invoice_dir: TempDir,
}

impl TestApp {
  pub fn new() -> Self {
    Self::with_store(Arc::new(MemoryLedgerStore::new()))
  }

  /// Same wiring as `new`, over the given ledger store.
  pub fn with_store(store: Arc<dyn LedgerStore>) -> Self {
    setup_tracing();
    let invoice_dir = tempfile::tempdir().expect("tempdir");
    let dir = invoice_dir.path().to_string_lossy().to_string();
    let config = AppConfig::from_lookup(|name| match name {
      "DATABASE_URL" => Some("memory://tests".to_string()),
      "APP_BASE_URL" => Some("http://ledger.test".to_string()),
      "PAYTM_MID" => Some("MID-TEST".to_string()),
      "PAYTM_MERCHANT_KEY" => Some(MERCHANT_KEY.to_string()),
      "INVOICE_DIR" => Some(dir.clone()),
      "COMPANY_GSTIN" => Some("29ABCDE1234F1Z5".to_string()),
      _ => None,
    })
    .expect("test config");

    let gateway = Arc::new(StubGateway::default());
    let artifacts = Arc::new(FlakyArtifacts {
      inner: LocalArtifactStore::new(config.invoice_dir.clone(), config.app_base_url.clone()),
      fail: AtomicBool::new(false),
    });
    let services = Services {
      store: store.clone(),
      gateway: gateway.clone(),
      renderer: Arc::new(TextPdfRenderer),
      artifacts: artifacts.clone(),
      post_payment: Arc::new(BuyerNotifier::new(store)),
    };

    Self {
      state: AppState::new(Arc::new(config), services),
      gateway,
      artifacts,
      _invoice_dir: invoice_dir,
    }
  }

  pub fn store(&self) -> &Arc<dyn LedgerStore> {
    &self.state.store
  }

  pub async fn seed_buyer(&self) -> Buyer {
    let buyer = NewBuyer {
      name: "Sharma General Store".to_string(),
      email: Some("sharma@example.com".to_string()),
      phone: Some("+919800000001".to_string()),
      gstin: None,
      shop_address: Some(shop_address("12 Market Road")),
    }
    .into_buyer();
    self.store().insert_buyer(&buyer).await.expect("insert buyer");
    buyer
  }

  pub async fn seed_seller(&self) -> Seller {
    let seller = NewSeller {
      name: "Ganga Wholesale".to_string(),
      gstin: Some("09AAACG1234K1Z2".to_string()),
      address: Some("Transport Nagar, Kanpur".to_string()),
    }
    .into_seller();
    self.store().insert_seller(&seller).await.expect("insert seller");
    seller
  }

  pub async fn seed_product(&self, name: &str, price: Decimal, brand: Option<&str>) -> Product {
    let product = NewProduct {
      name: name.to_string(),
      brand: brand.map(String::from),
      seller_id: None,
      final_price: Some(price),
      list_price: None,
      purchase_price: None,
      gst_rate: Some(Decimal::from(5)),
    }
    .into_product();
    self.store().insert_product(&product).await.expect("insert product");
    product
  }

  /// One ad-hoc line: 2 x 250.00 = 500.00.
  pub async fn place_simple_order(&self, buyer: &Buyer) -> Order {
    let request = PlaceOrderRequest {
      buyer_id: Some(buyer.id),
      items: vec![adhoc_item("Basmati Rice 5kg", "250.00", 2)],
      ..Default::default()
    };
    place_order(&self.state, request).await.expect("place order")
  }
}

pub fn shop_address(line1: &str) -> ShopAddress {
  ShopAddress {
    line1: line1.to_string(),
    line2: None,
    city: "Lucknow".to_string(),
    state: "Uttar Pradesh".to_string(),
    pincode: "226001".to_string(),
  }
}

pub fn dec(raw: &str) -> Decimal {
  raw.parse().expect("decimal literal")
}

pub fn adhoc_item(name: &str, price: &str, quantity: i64) -> OrderLineRequest {
  OrderLineRequest {
    name: Some(name.to_string()),
    price: Some(dec(price)),
    quantity: Some(json!(quantity)),
    ..Default::default()
  }
}

pub fn catalog_item(product_id: impl ToString, quantity: i64) -> OrderLineRequest {
  OrderLineRequest {
    product_id: Some(product_id.to_string()),
    quantity: Some(json!(quantity)),
    ..Default::default()
  }
}

pub fn staff() -> Actor {
  Actor::new("staff-01", ActorRole::Staff)
}

/// Callback fields with a valid `CHECKSUMHASH` appended.
pub fn signed_fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  let mut fields: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
  let checksum = paytm_checksum(MERCHANT_KEY, &fields).expect("checksum");
  fields.insert("CHECKSUMHASH".to_string(), checksum);
  fields
}

/// A signed `TXN_SUCCESS` callback for `amount` rupees against `invoice_number`.
pub fn success_callback(invoice_number: &str, amount: &str, txn_id: &str) -> BTreeMap<String, String> {
  signed_fields(&[
    ("ORDERID", invoice_number),
    ("STATUS", "TXN_SUCCESS"),
    ("TXNAMOUNT", amount),
    ("TXNID", txn_id),
    ("MID", "MID-TEST"),
  ])
}

pub fn form_payload(fields: &BTreeMap<String, String>) -> GatewayPayload {
  let body = serde_urlencoded::to_string(fields).expect("form encode");
  GatewayPayload::Form(Bytes::from(body))
}

pub fn json_payload(fields: &BTreeMap<String, String>) -> GatewayPayload {
  let body = serde_json::to_vec(fields).expect("json encode");
  GatewayPayload::Json(Bytes::from(body))
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
