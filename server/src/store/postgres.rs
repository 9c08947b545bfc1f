// server/src/store/postgres.rs

use super::{LedgerStore, LedgerTx, PaymentClaim};
use crate::errors::{AppError, Result};
use crate::models::{
  AuditEntry, Buyer, DispatchInfo, GatewayQr, Invoice, InvoiceLine, InvoiceStatus, Notification, Order, OrderLine,
  OrderPaymentStatus, OrderStatus, PartySnapshot, Payment, PaymentRef, PaymentStatus, Product, Seller, ShopAddress,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use tracing::{event, Level};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
  "id, name, brand, seller_id, final_price, list_price, purchase_price, gst_rate, created_at";
const BUYER_COLUMNS: &str = "id, name, email, phone, gstin, shop_address, created_at, updated_at";
const SELLER_COLUMNS: &str = "id, name, gstin, address, created_at";
const ORDER_COLUMNS: &str = "id, order_number, buyer_id, seller_id, items, brand_totals, total_amount, \
  discount_amount, gst_amount, final_amount, shipping_address, status, payment_status, dispatch, audit_trail, \
  invoice_id, invoice_url, created_at, updated_at";
const INVOICE_COLUMNS: &str = "id, number, order_id, buyer_id, seller_id, items, subtotal, discount_total, \
  gst_total, grand_total, amount_paid, balance_due, status, paid_at, payment_refs, buyer_snapshot, \
  seller_snapshot, qr, document_url, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, idempotency_key, invoice_id, order_id, buyer_id, gateway, amount, status, \
  gateway_order_id, gateway_txn_id, signature_verified, raw_payload, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str = "id, buyer_id, title, body, created_at";

/// Unique violations become `Conflict`; everything else stays a database error.
fn map_db_err(context: &str) -> impl Fn(sqlx::Error) -> AppError + '_ {
  move |err| match &err {
    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
      AppError::Conflict(format!("{}: {}", context, db_err.message()))
    }
    _ => {
      event!(Level::ERROR, error = %err, context, "Database operation failed.");
      AppError::Sqlx(err)
    }
  }
}

#[derive(FromRow)]
struct BuyerRow {
  id: Uuid,
  name: String,
  email: Option<String>,
  phone: Option<String>,
  gstin: Option<String>,
  shop_address: Option<Json<ShopAddress>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<BuyerRow> for Buyer {
  fn from(row: BuyerRow) -> Self {
    Buyer {
      id: row.id,
      name: row.name,
      email: row.email,
      phone: row.phone,
      gstin: row.gstin,
      shop_address: row.shop_address.map(|Json(a)| a),
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(FromRow)]
struct OrderRow {
  id: Uuid,
  order_number: Option<String>,
  buyer_id: Uuid,
  seller_id: Option<Uuid>,
  items: Json<Vec<OrderLine>>,
  brand_totals: Json<BTreeMap<String, Decimal>>,
  total_amount: Decimal,
  discount_amount: Decimal,
  gst_amount: Decimal,
  final_amount: Decimal,
  shipping_address: Option<Json<ShopAddress>>,
  status: OrderStatus,
  payment_status: OrderPaymentStatus,
  dispatch: Option<Json<DispatchInfo>>,
  audit_trail: Json<Vec<AuditEntry>>,
  invoice_id: Option<Uuid>,
  invoice_url: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: row.id,
      order_number: row.order_number,
      buyer_id: row.buyer_id,
      seller_id: row.seller_id,
      items: row.items.0,
      brand_totals: row.brand_totals.0,
      total_amount: row.total_amount,
      discount_amount: row.discount_amount,
      gst_amount: row.gst_amount,
      final_amount: row.final_amount,
      shipping_address: row.shipping_address.map(|Json(a)| a),
      status: row.status,
      payment_status: row.payment_status,
      dispatch: row.dispatch.map(|Json(d)| d),
      audit_trail: row.audit_trail.0,
      invoice_id: row.invoice_id,
      invoice_url: row.invoice_url,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(FromRow)]
struct InvoiceRow {
  id: Uuid,
  number: String,
  order_id: Uuid,
  buyer_id: Uuid,
  seller_id: Option<Uuid>,
  items: Json<Vec<InvoiceLine>>,
  subtotal: i64,
  discount_total: i64,
  gst_total: i64,
  grand_total: i64,
  amount_paid: i64,
  balance_due: i64,
  status: InvoiceStatus,
  paid_at: Option<DateTime<Utc>>,
  payment_refs: Json<Vec<PaymentRef>>,
  buyer_snapshot: Json<PartySnapshot>,
  seller_snapshot: Option<Json<PartySnapshot>>,
  qr: Option<Json<GatewayQr>>,
  document_url: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
  fn from(row: InvoiceRow) -> Self {
    Invoice {
      id: row.id,
      number: row.number,
      order_id: row.order_id,
      buyer_id: row.buyer_id,
      seller_id: row.seller_id,
      items: row.items.0,
      subtotal: row.subtotal,
      discount_total: row.discount_total,
      gst_total: row.gst_total,
      grand_total: row.grand_total,
      amount_paid: row.amount_paid,
      balance_due: row.balance_due,
      status: row.status,
      paid_at: row.paid_at,
      payment_refs: row.payment_refs.0,
      buyer_snapshot: row.buyer_snapshot.0,
      seller_snapshot: row.seller_snapshot.map(|Json(s)| s),
      qr: row.qr.map(|Json(q)| q),
      document_url: row.document_url,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(FromRow)]
struct PaymentRow {
  id: Uuid,
  idempotency_key: String,
  invoice_id: Uuid,
  order_id: Uuid,
  buyer_id: Uuid,
  gateway: String,
  amount: i64,
  status: PaymentStatus,
  gateway_order_id: Option<String>,
  gateway_txn_id: Option<String>,
  signature_verified: bool,
  raw_payload: Option<Json<serde_json::Value>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
  fn from(row: PaymentRow) -> Self {
    Payment {
      id: row.id,
      idempotency_key: row.idempotency_key,
      invoice_id: row.invoice_id,
      order_id: row.order_id,
      buyer_id: row.buyer_id,
      gateway: row.gateway,
      amount: row.amount,
      status: row.status,
      gateway_order_id: row.gateway_order_id,
      gateway_txn_id: row.gateway_txn_id,
      signature_verified: row.signature_verified,
      raw_payload: row.raw_payload.map(|Json(v)| v),
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(Clone)]
pub struct PgLedgerStore {
  pool: PgPool,
}

impl PgLedgerStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Connects and applies `server/migrations`.
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPool::connect(database_url).await?;
    event!(Level::INFO, "Successfully connected to the database.");
    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .map_err(|e| AppError::Config(format!("Database migration failed: {}", e)))?;
    event!(Level::INFO, "Database migrations applied.");
    Ok(Self::new(pool))
  }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
    let tx = self.pool.begin().await.map_err(map_db_err("begin transaction"))?;
    Ok(Box::new(PgLedgerTx { tx }))
  }

  async fn ping(&self) -> Result<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_db_err("ping"))?;
    Ok(())
  }

  async fn insert_product(&self, product: &Product) -> Result<()> {
    sqlx::query(
      "INSERT INTO products (id, name, brand, seller_id, final_price, list_price, purchase_price, gst_rate, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(product.seller_id)
    .bind(product.final_price)
    .bind(product.list_price)
    .bind(product.purchase_price)
    .bind(product.gst_rate)
    .bind(product.created_at)
    .execute(&self.pool)
    .await
    .map_err(map_db_err("insert product"))?;
    Ok(())
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products ORDER BY name ASC", PRODUCT_COLUMNS))
      .fetch_all(&self.pool)
      .await
      .map_err(map_db_err("list products"))?;
    Ok(products)
  }

  async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_db_err("find product"))?;
    Ok(product)
  }

  async fn insert_buyer(&self, buyer: &Buyer) -> Result<()> {
    sqlx::query(
      "INSERT INTO buyers (id, name, email, phone, gstin, shop_address, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(buyer.id)
    .bind(&buyer.name)
    .bind(&buyer.email)
    .bind(&buyer.phone)
    .bind(&buyer.gstin)
    .bind(buyer.shop_address.as_ref().map(Json))
    .bind(buyer.created_at)
    .bind(buyer.updated_at)
    .execute(&self.pool)
    .await
    .map_err(map_db_err("insert buyer"))?;
    Ok(())
  }

  async fn find_buyer(&self, id: Uuid) -> Result<Option<Buyer>> {
    let row = sqlx::query_as::<_, BuyerRow>(&format!("SELECT {} FROM buyers WHERE id = $1", BUYER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_db_err("find buyer"))?;
    Ok(row.map(Buyer::from))
  }

  async fn insert_seller(&self, seller: &Seller) -> Result<()> {
    sqlx::query("INSERT INTO sellers (id, name, gstin, address, created_at) VALUES ($1, $2, $3, $4, $5)")
      .bind(seller.id)
      .bind(&seller.name)
      .bind(&seller.gstin)
      .bind(&seller.address)
      .bind(seller.created_at)
      .execute(&self.pool)
      .await
      .map_err(map_db_err("insert seller"))?;
    Ok(())
  }

  async fn find_seller(&self, id: Uuid) -> Result<Option<Seller>> {
    let seller = sqlx::query_as::<_, Seller>(&format!("SELECT {} FROM sellers WHERE id = $1", SELLER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_db_err("find seller"))?;
    Ok(seller)
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_db_err("find order"))?;
    Ok(row.map(Order::from))
  }

  async fn list_orders_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    ))
    .bind(buyer_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_db_err("list orders"))?;
    Ok(rows.into_iter().map(Order::from).collect())
  }

  async fn find_invoice(&self, number: &str) -> Result<Option<Invoice>> {
    let row = sqlx::query_as::<_, InvoiceRow>(&format!("SELECT {} FROM invoices WHERE number = $1", INVOICE_COLUMNS))
      .bind(number)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_db_err("find invoice"))?;
    Ok(row.map(Invoice::from))
  }

  async fn list_payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
      "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY created_at ASC",
      PAYMENT_COLUMNS
    ))
    .bind(invoice_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_db_err("list payments"))?;
    Ok(rows.into_iter().map(Payment::from).collect())
  }

  async fn insert_notification(&self, notification: &Notification) -> Result<()> {
    sqlx::query("INSERT INTO notifications (id, buyer_id, title, body, created_at) VALUES ($1, $2, $3, $4, $5)")
      .bind(notification.id)
      .bind(notification.buyer_id)
      .bind(&notification.title)
      .bind(&notification.body)
      .bind(notification.created_at)
      .execute(&self.pool)
      .await
      .map_err(map_db_err("insert notification"))?;
    Ok(())
  }

  async fn list_notifications(&self, buyer_id: Uuid) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(&format!(
      "SELECT {} FROM notifications WHERE buyer_id = $1 ORDER BY created_at DESC",
      NOTIFICATION_COLUMNS
    ))
    .bind(buyer_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_db_err("list notifications"))?;
    Ok(notifications)
  }
}

/// Wraps a sqlx transaction; dropping it without `commit` rolls back.
struct PgLedgerTx {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
  async fn find_buyer(&mut self, id: Uuid) -> Result<Option<Buyer>> {
    let row = sqlx::query_as::<_, BuyerRow>(&format!("SELECT {} FROM buyers WHERE id = $1", BUYER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(map_db_err("find buyer"))?;
    Ok(row.map(Buyer::from))
  }

  async fn update_buyer_address(&mut self, id: Uuid, address: &ShopAddress) -> Result<()> {
    let result = sqlx::query("UPDATE buyers SET shop_address = $2, updated_at = now() WHERE id = $1")
      .bind(id)
      .bind(Json(address))
      .execute(&mut *self.tx)
      .await
      .map_err(map_db_err("update buyer address"))?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Buyer {} not found", id)));
    }
    Ok(())
  }

  async fn find_seller(&mut self, id: Uuid) -> Result<Option<Seller>> {
    let seller = sqlx::query_as::<_, Seller>(&format!("SELECT {} FROM sellers WHERE id = $1", SELLER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(map_db_err("find seller"))?;
    Ok(seller)
  }

  async fn find_products(&mut self, ids: &[Uuid]) -> Result<Vec<Product>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let products = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
      .bind(ids)
      .fetch_all(&mut *self.tx)
      .await
      .map_err(map_db_err("find products"))?;
    Ok(products)
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, buyer_id, seller_id, items, brand_totals, total_amount, discount_amount, \
       gst_amount, final_amount, shipping_address, status, payment_status, dispatch, audit_trail, invoice_id, \
       invoice_url, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(Json(&order.items))
    .bind(Json(&order.brand_totals))
    .bind(order.total_amount)
    .bind(order.discount_amount)
    .bind(order.gst_amount)
    .bind(order.final_amount)
    .bind(order.shipping_address.as_ref().map(Json))
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.dispatch.as_ref().map(Json))
    .bind(Json(&order.audit_trail))
    .bind(order.invoice_id)
    .bind(&order.invoice_url)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err("insert order"))?;
    Ok(())
  }

  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&mut *self.tx)
      .await
      .map_err(map_db_err("lock order"))?;
    Ok(row.map(Order::from))
  }

  async fn update_order(&mut self, order: &Order) -> Result<()> {
    sqlx::query(
      "UPDATE orders SET status = $2, payment_status = $3, dispatch = $4, audit_trail = $5, invoice_id = $6, \
       invoice_url = $7, updated_at = $8 WHERE id = $1",
    )
    .bind(order.id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.dispatch.as_ref().map(Json))
    .bind(Json(&order.audit_trail))
    .bind(order.invoice_id)
    .bind(&order.invoice_url)
    .bind(order.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err("update order"))?;
    Ok(())
  }

  async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
    sqlx::query(
      "INSERT INTO invoices (id, number, order_id, buyer_id, seller_id, items, subtotal, discount_total, gst_total, \
       grand_total, amount_paid, balance_due, status, paid_at, payment_refs, buyer_snapshot, seller_snapshot, qr, \
       document_url, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)",
    )
    .bind(invoice.id)
    .bind(&invoice.number)
    .bind(invoice.order_id)
    .bind(invoice.buyer_id)
    .bind(invoice.seller_id)
    .bind(Json(&invoice.items))
    .bind(invoice.subtotal)
    .bind(invoice.discount_total)
    .bind(invoice.gst_total)
    .bind(invoice.grand_total)
    .bind(invoice.amount_paid)
    .bind(invoice.balance_due)
    .bind(invoice.status)
    .bind(invoice.paid_at)
    .bind(Json(&invoice.payment_refs))
    .bind(Json(&invoice.buyer_snapshot))
    .bind(invoice.seller_snapshot.as_ref().map(Json))
    .bind(invoice.qr.as_ref().map(Json))
    .bind(&invoice.document_url)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err("insert invoice"))?;
    Ok(())
  }

  async fn lock_invoice(&mut self, number: &str) -> Result<Option<Invoice>> {
    let row = sqlx::query_as::<_, InvoiceRow>(&format!(
      "SELECT {} FROM invoices WHERE number = $1 FOR UPDATE",
      INVOICE_COLUMNS
    ))
    .bind(number)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(map_db_err("lock invoice"))?;
    Ok(row.map(Invoice::from))
  }

  async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()> {
    sqlx::query(
      "UPDATE invoices SET amount_paid = $2, balance_due = $3, status = $4, paid_at = $5, payment_refs = $6, \
       qr = $7, document_url = $8, updated_at = $9 WHERE id = $1",
    )
    .bind(invoice.id)
    .bind(invoice.amount_paid)
    .bind(invoice.balance_due)
    .bind(invoice.status)
    .bind(invoice.paid_at)
    .bind(Json(&invoice.payment_refs))
    .bind(invoice.qr.as_ref().map(Json))
    .bind(&invoice.document_url)
    .bind(invoice.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err("update invoice"))?;
    Ok(())
  }

  async fn claim_payment(&mut self, payment: &Payment) -> Result<PaymentClaim> {
    let inserted = sqlx::query_as::<_, PaymentRow>(&format!(
      "INSERT INTO payments ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
       ON CONFLICT (idempotency_key) DO NOTHING RETURNING {cols}",
      cols = PAYMENT_COLUMNS
    ))
    .bind(payment.id)
    .bind(&payment.idempotency_key)
    .bind(payment.invoice_id)
    .bind(payment.order_id)
    .bind(payment.buyer_id)
    .bind(&payment.gateway)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(&payment.gateway_order_id)
    .bind(&payment.gateway_txn_id)
    .bind(payment.signature_verified)
    .bind(payment.raw_payload.as_ref().map(Json))
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(map_db_err("claim payment"))?;

    if let Some(row) = inserted {
      return Ok(PaymentClaim::Created(row.into()));
    }

    let existing = sqlx::query_as::<_, PaymentRow>(&format!(
      "SELECT {} FROM payments WHERE idempotency_key = $1 FOR UPDATE",
      PAYMENT_COLUMNS
    ))
    .bind(&payment.idempotency_key)
    .fetch_one(&mut *self.tx)
    .await
    .map_err(map_db_err("lock payment"))?;
    event!(Level::DEBUG, key = %payment.idempotency_key, "Payment key already claimed.");
    Ok(PaymentClaim::Existing(existing.into()))
  }

  async fn lock_payment(&mut self, idempotency_key: &str) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
      "SELECT {} FROM payments WHERE idempotency_key = $1 FOR UPDATE",
      PAYMENT_COLUMNS
    ))
    .bind(idempotency_key)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(map_db_err("lock payment"))?;
    Ok(row.map(Into::into))
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
    sqlx::query(
      "UPDATE payments SET amount = $2, status = $3, gateway_txn_id = $4, signature_verified = $5, raw_payload = $6, \
       updated_at = $7 WHERE idempotency_key = $1",
    )
    .bind(&payment.idempotency_key)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(&payment.gateway_txn_id)
    .bind(payment.signature_verified)
    .bind(payment.raw_payload.as_ref().map(Json))
    .bind(payment.updated_at)
    .execute(&mut *self.tx)
    .await
    .map_err(map_db_err("update payment"))?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    self.tx.commit().await.map_err(map_db_err("commit"))?;
    Ok(())
  }
}
