// server/src/store/memory.rs

//! In-process ledger store, selected with `DATABASE_URL=memory://` and used by the tests.
//!
//! One async mutex guards the whole ledger. A transaction holds the lock for its whole
//! life and works on a staged copy that replaces the shared state on commit.

use super::{LedgerStore, LedgerTx, PaymentClaim};
use crate::errors::{AppError, Result};
use crate::models::{Buyer, Invoice, Notification, Order, Payment, Product, Seller, ShopAddress};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Ledger {
  products: HashMap<Uuid, Product>,
  buyers: HashMap<Uuid, Buyer>,
  sellers: HashMap<Uuid, Seller>,
  orders: HashMap<Uuid, Order>,
  invoices: HashMap<String, Invoice>,
  payments: HashMap<String, Payment>,
  notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
  ledger: Arc<Mutex<Ledger>>,
}

impl MemoryLedgerStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
  async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
    let guard = self.ledger.clone().lock_owned().await;
    let staged = guard.clone();
    Ok(Box::new(MemoryLedgerTx { guard, staged }))
  }

  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn insert_product(&self, product: &Product) -> Result<()> {
    self.ledger.lock().await.products.insert(product.id, product.clone());
    Ok(())
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let mut products: Vec<Product> = self.ledger.lock().await.products.values().cloned().collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
  }

  async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
    Ok(self.ledger.lock().await.products.get(&id).cloned())
  }

  async fn insert_buyer(&self, buyer: &Buyer) -> Result<()> {
    self.ledger.lock().await.buyers.insert(buyer.id, buyer.clone());
    Ok(())
  }

  async fn find_buyer(&self, id: Uuid) -> Result<Option<Buyer>> {
    Ok(self.ledger.lock().await.buyers.get(&id).cloned())
  }

  async fn insert_seller(&self, seller: &Seller) -> Result<()> {
    self.ledger.lock().await.sellers.insert(seller.id, seller.clone());
    Ok(())
  }

  async fn find_seller(&self, id: Uuid) -> Result<Option<Seller>> {
    Ok(self.ledger.lock().await.sellers.get(&id).cloned())
  }

  async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.ledger.lock().await.orders.get(&id).cloned())
  }

  async fn list_orders_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .ledger
      .lock()
      .await
      .orders
      .values()
      .filter(|o| o.buyer_id == buyer_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
  }

  async fn find_invoice(&self, number: &str) -> Result<Option<Invoice>> {
    Ok(self.ledger.lock().await.invoices.get(number).cloned())
  }

  async fn list_payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>> {
    let mut payments: Vec<Payment> = self
      .ledger
      .lock()
      .await
      .payments
      .values()
      .filter(|p| p.invoice_id == invoice_id)
      .cloned()
      .collect();
    payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(payments)
  }

  async fn insert_notification(&self, notification: &Notification) -> Result<()> {
    self.ledger.lock().await.notifications.push(notification.clone());
    Ok(())
  }

  async fn list_notifications(&self, buyer_id: Uuid) -> Result<Vec<Notification>> {
    let ledger = self.ledger.lock().await;
    Ok(ledger.notifications.iter().rev().filter(|n| n.buyer_id == buyer_id).cloned().collect())
  }
}

struct MemoryLedgerTx {
  guard: OwnedMutexGuard<Ledger>,
  staged: Ledger,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
  async fn find_buyer(&mut self, id: Uuid) -> Result<Option<Buyer>> {
    Ok(self.staged.buyers.get(&id).cloned())
  }

  async fn update_buyer_address(&mut self, id: Uuid, address: &ShopAddress) -> Result<()> {
    let buyer = self
      .staged
      .buyers
      .get_mut(&id)
      .ok_or_else(|| AppError::NotFound(format!("Buyer {} not found", id)))?;
    buyer.shop_address = Some(address.clone());
    buyer.updated_at = Utc::now();
    Ok(())
  }

  async fn find_seller(&mut self, id: Uuid) -> Result<Option<Seller>> {
    Ok(self.staged.sellers.get(&id).cloned())
  }

  async fn find_products(&mut self, ids: &[Uuid]) -> Result<Vec<Product>> {
    Ok(ids.iter().filter_map(|id| self.staged.products.get(id).cloned()).collect())
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    if self.staged.orders.contains_key(&order.id) {
      return Err(AppError::Conflict(format!("Order {} already exists", order.id)));
    }
    self.staged.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.staged.orders.get(&id).cloned())
  }

  async fn update_order(&mut self, order: &Order) -> Result<()> {
    let stored = self
      .staged
      .orders
      .get_mut(&order.id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order.id)))?;
    stored.status = order.status;
    stored.payment_status = order.payment_status;
    stored.dispatch = order.dispatch.clone();
    stored.audit_trail = order.audit_trail.clone();
    stored.invoice_id = order.invoice_id;
    stored.invoice_url = order.invoice_url.clone();
    stored.updated_at = order.updated_at;
    Ok(())
  }

  async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
    if self.staged.invoices.contains_key(&invoice.number) {
      return Err(AppError::Conflict(format!("Invoice number {} already exists", invoice.number)));
    }
    if self.staged.invoices.values().any(|i| i.order_id == invoice.order_id) {
      return Err(AppError::Conflict(format!("Order {} is already invoiced", invoice.order_id)));
    }
    self.staged.invoices.insert(invoice.number.clone(), invoice.clone());
    Ok(())
  }

  async fn lock_invoice(&mut self, number: &str) -> Result<Option<Invoice>> {
    Ok(self.staged.invoices.get(number).cloned())
  }

  async fn update_invoice(&mut self, invoice: &Invoice) -> Result<()> {
    match self.staged.invoices.get_mut(&invoice.number) {
      Some(stored) => {
        *stored = invoice.clone();
        Ok(())
      }
      None => Err(AppError::NotFound(format!("Invoice {} not found", invoice.number))),
    }
  }

  async fn claim_payment(&mut self, payment: &Payment) -> Result<PaymentClaim> {
    if let Some(existing) = self.staged.payments.get(&payment.idempotency_key) {
      return Ok(PaymentClaim::Existing(existing.clone()));
    }
    self.staged.payments.insert(payment.idempotency_key.clone(), payment.clone());
    Ok(PaymentClaim::Created(payment.clone()))
  }

  async fn lock_payment(&mut self, idempotency_key: &str) -> Result<Option<Payment>> {
    Ok(self.staged.payments.get(idempotency_key).cloned())
  }

  async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
    match self.staged.payments.get_mut(&payment.idempotency_key) {
      Some(stored) => {
        *stored = payment.clone();
        Ok(())
      }
      None => Err(AppError::NotFound(format!("Payment {} not found", payment.idempotency_key))),
    }
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let MemoryLedgerTx { mut guard, staged } = *self;
    *guard = staged;
    event!(Level::DEBUG, "In-memory ledger transaction committed.");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{NewBuyer, ShopAddress};

  fn buyer() -> Buyer {
    NewBuyer {
      name: "Gupta Stores".into(),
      email: None,
      phone: None,
      gstin: None,
      shop_address: None,
    }
    .into_buyer()
  }

  fn address() -> ShopAddress {
    ShopAddress {
      line1: "12 Market Road".into(),
      line2: None,
      city: "Indore".into(),
      state: "MP".into(),
      pincode: "452001".into(),
    }
  }

  #[tokio::test]
  async fn dropped_scope_discards_writes() {
    let store = MemoryLedgerStore::new();
    let b = buyer();
    store.insert_buyer(&b).await.unwrap();

    {
      let mut tx = store.begin().await.unwrap();
      tx.update_buyer_address(b.id, &address()).await.unwrap();
    }
    assert!(store.find_buyer(b.id).await.unwrap().unwrap().shop_address.is_none());

    let mut tx = store.begin().await.unwrap();
    tx.update_buyer_address(b.id, &address()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(store.find_buyer(b.id).await.unwrap().unwrap().shop_address, Some(address()));
  }
}
