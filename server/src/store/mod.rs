// server/src/store/mod.rs

//! Ledger persistence.
//!
//! [`LedgerStore`] serves plain reads and catalog writes. Multi-row operations go
//! through a [`LedgerTx`] from [`LedgerStore::begin`]: writes become visible only on
//! [`LedgerTx::commit`], and dropping an uncommitted scope rolls everything back.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{Buyer, Invoice, Notification, Order, Payment, Product, Seller, ShopAddress};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Outcome of an insert-if-absent on the payment idempotency key.
#[derive(Debug, Clone)]
pub enum PaymentClaim {
  /// No row had the key; the given payment was inserted.
  Created(Payment),
  /// A row already existed; it is returned locked and unchanged.
  Existing(Payment),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

  async fn ping(&self) -> Result<()>;

  async fn insert_product(&self, product: &Product) -> Result<()>;
  async fn list_products(&self) -> Result<Vec<Product>>;
  async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

  async fn insert_buyer(&self, buyer: &Buyer) -> Result<()>;
  async fn find_buyer(&self, id: Uuid) -> Result<Option<Buyer>>;

  async fn insert_seller(&self, seller: &Seller) -> Result<()>;
  async fn find_seller(&self, id: Uuid) -> Result<Option<Seller>>;

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
  /// Newest first.
  async fn list_orders_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>>;

  async fn find_invoice(&self, number: &str) -> Result<Option<Invoice>>;
  async fn list_payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>>;

  async fn insert_notification(&self, notification: &Notification) -> Result<()>;
  /// Newest first.
  async fn list_notifications(&self, buyer_id: Uuid) -> Result<Vec<Notification>>;
}

/// A transactional scope over the ledger. `lock_*` reads hold the row until the scope ends.
#[async_trait]
pub trait LedgerTx: Send {
  async fn find_buyer(&mut self, id: Uuid) -> Result<Option<Buyer>>;
  async fn update_buyer_address(&mut self, id: Uuid, address: &ShopAddress) -> Result<()>;
  async fn find_seller(&mut self, id: Uuid) -> Result<Option<Seller>>;
  /// Products matching `ids`; unknown ids are simply absent from the result.
  async fn find_products(&mut self, ids: &[Uuid]) -> Result<Vec<Product>>;

  async fn insert_order(&mut self, order: &Order) -> Result<()>;
  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;
  /// Writes the mutable parts of an order: status, payment status, dispatch, audit
  /// trail and invoice link. Line items and amounts never change.
  async fn update_order(&mut self, order: &Order) -> Result<()>;

  /// `Conflict` when the number (or the order) already has an invoice.
  async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()>;
  async fn lock_invoice(&mut self, number: &str) -> Result<Option<Invoice>>;
  async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()>;

  async fn claim_payment(&mut self, payment: &Payment) -> Result<PaymentClaim>;
  async fn lock_payment(&mut self, idempotency_key: &str) -> Result<Option<Payment>>;
  async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

  async fn commit(self: Box<Self>) -> Result<()>;
}
