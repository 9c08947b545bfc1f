// server/src/services/notifier.rs

use crate::errors::Result;
use crate::models::{InvoiceStatus, Notification};
use crate::money::format_minor;
use crate::store::LedgerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

/// A payment that has just been applied to an invoice.
#[derive(Debug, Clone)]
pub struct CapturedPayment {
  pub payment_id: Uuid,
  pub buyer_id: Uuid,
  pub order_id: Uuid,
  pub invoice_number: String,
  pub amount_minor: i64,
  pub balance_due: i64,
  pub invoice_status: InvoiceStatus,
}

/// Runs once per captured payment, after the ledger commit.
#[async_trait]
pub trait PostPaymentHook: Send + Sync {
  async fn on_captured(&self, payment: &CapturedPayment) -> Result<()>;
}

/// Leaves the buyer an in-app notification.
pub struct BuyerNotifier {
  store: Arc<dyn LedgerStore>,
}

impl BuyerNotifier {
  pub fn new(store: Arc<dyn LedgerStore>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl PostPaymentHook for BuyerNotifier {
  async fn on_captured(&self, payment: &CapturedPayment) -> Result<()> {
    let body = if payment.invoice_status == InvoiceStatus::Paid {
      format!(
        "We received Rs. {} for invoice {}. The invoice is fully paid.",
        format_minor(payment.amount_minor),
        payment.invoice_number
      )
    } else {
      format!(
        "We received Rs. {} for invoice {}. Balance due: Rs. {}.",
        format_minor(payment.amount_minor),
        payment.invoice_number,
        format_minor(payment.balance_due)
      )
    };
    let notification = Notification::new(payment.buyer_id, "Payment received", body);
    self.store.insert_notification(&notification).await?;
    event!(Level::INFO, buyer_id = %payment.buyer_id, invoice = %payment.invoice_number, "Buyer notified of payment.");
    Ok(())
  }
}
