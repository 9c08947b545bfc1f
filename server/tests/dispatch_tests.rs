// tests/dispatch_tests.rs

mod common;

use chrono::Utc;
use common::*;
use mandi_server::errors::AppError;
use mandi_server::models::{Actor, ActorRole, Invoice, InvoiceStatus, OrderStatus, PaymentStatus};
use mandi_server::pipelines::contexts::{DispatchRequest, PlaceOrderRequest};
use mandi_server::pipelines::{dispatch_order, place_order};
use mandi_server::services::billing;
use mandi_server::services::renderer::ArtifactStore;
use std::sync::atomic::Ordering;
use uuid::Uuid;

fn courier_request() -> DispatchRequest {
  DispatchRequest {
    note: Some("Loaded on the morning truck".to_string()),
    courier: Some("Delhivery".to_string()),
    awb: Some("AWB123456".to_string()),
  }
}

#[tokio::test]
async fn dispatch_issues_an_invoice_with_a_qr_and_a_document() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;

  let (dispatched, invoice) = dispatch_order(&app.state, order.id, staff(), courier_request())
    .await
    .expect("dispatch");

  assert_eq!(dispatched.status, OrderStatus::Dispatched);
  let info = dispatched.dispatch.as_ref().expect("dispatch info");
  assert_eq!(info.courier.as_deref(), Some("Delhivery"));
  assert_eq!(info.awb.as_deref(), Some("AWB123456"));
  assert_eq!(info.dispatched_by, "staff-01");
  assert_eq!(dispatched.audit_trail.len(), 1);
  assert_eq!(dispatched.audit_trail[0].action, "DISPATCHED");
  assert_eq!(dispatched.audit_trail[0].actor, "staff-01");
  assert_eq!(dispatched.invoice_id, Some(invoice.id));

  let order_number = order.order_number.clone().expect("order number");
  assert_eq!(invoice.number, format!("INV-{}", order_number));
  assert_eq!(invoice.order_id, order.id);
  assert_eq!(invoice.subtotal, 50_000);
  assert_eq!(invoice.grand_total, 50_000);
  assert_eq!(invoice.subtotal - invoice.discount_total + invoice.gst_total, invoice.grand_total);
  assert_eq!(invoice.amount_paid, 0);
  assert_eq!(invoice.balance_due, 50_000);
  assert_eq!(invoice.status, InvoiceStatus::Unpaid);
  assert_eq!(invoice.buyer_snapshot.name, buyer.name);

  let qr = invoice.qr.as_ref().expect("qr attached");
  assert_eq!(qr.qr_id, format!("QR-{}", invoice.number));
  assert_eq!(app.gateway.qr_calls(), 1);

  let url = invoice.document_url.clone().expect("document rendered");
  assert_eq!(url, format!("http://ledger.test/api/v1/files/invoices/{}.pdf", invoice.number));
  assert_eq!(dispatched.invoice_url.as_deref(), Some(url.as_str()));

  let stored_invoice = app.store().find_invoice(&invoice.number).await.unwrap().expect("invoice");
  assert_eq!(stored_invoice, invoice);
  let stored_order = app.store().find_order(order.id).await.unwrap().expect("order");
  assert_eq!(stored_order, dispatched);

  let payments = app.store().list_payments_for_invoice(invoice.id).await.unwrap();
  assert_eq!(payments.len(), 1);
  assert_eq!(payments[0].status, PaymentStatus::Created);
  assert_eq!(payments[0].amount, 50_000);
  assert_eq!(payments[0].gateway_order_id.as_deref(), Some(invoice.number.as_str()));

  let pdf = app
    .artifacts
    .get(&format!("{}.pdf", invoice.number))
    .await
    .expect("artifact stored");
  assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn an_order_cannot_be_dispatched_twice() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;

  let (_, invoice) = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .expect("first dispatch");
  let err = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::InvalidState(_)), "got {:?}", err);
  assert_eq!(app.gateway.qr_calls(), 1);
  let stored = app.store().find_order(order.id).await.unwrap().expect("order");
  assert_eq!(stored.audit_trail.len(), 1);
  assert_eq!(stored.invoice_id, Some(invoice.id));
}

#[tokio::test]
async fn buyers_cannot_dispatch() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;

  let actor = Actor::new(buyer.id.to_string(), ActorRole::Buyer);
  let err = dispatch_order(&app.state, order.id, actor, DispatchRequest::default())
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::Forbidden(_)), "got {:?}", err);
  let stored = app.store().find_order(order.id).await.unwrap().expect("order");
  assert_eq!(stored.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn dispatching_an_unknown_order_is_not_found() {
  let app = TestApp::new();
  let err = dispatch_order(&app.state, Uuid::new_v4(), staff(), DispatchRequest::default())
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn a_failed_invoice_insert_rolls_the_dispatch_back() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;

  // Squat on the invoice number the dispatch is about to use.
  let squatter = Invoice::from_order(&order, &buyer, None, Utc::now()).expect("invoice");
  let mut tx = app.store().begin().await.unwrap();
  tx.insert_invoice(&squatter).await.unwrap();
  tx.commit().await.unwrap();

  let err = dispatch_order(&app.state, order.id, staff(), courier_request())
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
  let stored = app.store().find_order(order.id).await.unwrap().expect("order");
  assert_eq!(stored.status, OrderStatus::Confirmed);
  assert!(stored.dispatch.is_none());
  assert!(stored.audit_trail.is_empty());
  assert_eq!(stored.invoice_id, None);
  assert_eq!(app.gateway.qr_calls(), 0);
}

#[tokio::test]
async fn gateway_outage_still_issues_the_invoice_and_the_qr_can_be_retried() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;
  app.gateway.fail_qr.store(true, Ordering::SeqCst);

  let (dispatched, invoice) = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .expect("dispatch despite gateway outage");

  assert_eq!(dispatched.status, OrderStatus::Dispatched);
  assert!(invoice.qr.is_none());
  assert!(app.store().list_payments_for_invoice(invoice.id).await.unwrap().is_empty());

  app.gateway.fail_qr.store(false, Ordering::SeqCst);
  let with_qr = billing::ensure_invoice_qr(&app.state, &invoice.number).await.expect("qr retry");
  assert!(with_qr.qr.is_some());
  assert_eq!(app.store().list_payments_for_invoice(invoice.id).await.unwrap().len(), 1);

  let again = billing::ensure_invoice_qr(&app.state, &invoice.number).await.expect("idempotent");
  assert_eq!(again.qr, with_qr.qr);
  assert_eq!(app.gateway.qr_calls(), 2);
}

#[tokio::test]
async fn render_failure_still_issues_the_invoice_and_the_document_can_be_retried() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let order = app.place_simple_order(&buyer).await;
  app.artifacts.fail.store(true, Ordering::SeqCst);

  let (dispatched, invoice) = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .expect("dispatch despite render failure");
  assert!(invoice.document_url.is_none());
  assert!(dispatched.invoice_url.is_none());
  assert!(app.store().find_invoice(&invoice.number).await.unwrap().is_some());

  app.artifacts.fail.store(false, Ordering::SeqCst);
  let rendered = billing::render_invoice_document(&app.state, &invoice.number)
    .await
    .expect("render retry");
  let url = rendered.document_url.clone().expect("url");

  let stored_order = app.store().find_order(order.id).await.unwrap().expect("order");
  assert_eq!(stored_order.invoice_url, Some(url));
}

#[tokio::test]
async fn a_zero_total_order_gets_no_qr() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Free sample sachet", "0", 10)],
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order");

  let (_, invoice) = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .expect("dispatch");

  assert_eq!(invoice.grand_total, 0);
  assert_eq!(invoice.balance_due, 0);
  assert_eq!(invoice.status, InvoiceStatus::Unpaid);
  assert!(invoice.qr.is_none());
  assert_eq!(app.gateway.qr_calls(), 0);
}

#[tokio::test]
async fn long_invoices_keep_every_item_and_the_charges() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: (0..60).map(|i| adhoc_item(&format!("Item {}", i), "10.00", 1)).collect(),
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order");

  let (_, invoice) = dispatch_order(&app.state, order.id, staff(), DispatchRequest::default())
    .await
    .expect("dispatch");
  assert_eq!(invoice.grand_total, 60_000);

  let pdf = app
    .artifacts
    .get(&format!("{}.pdf", invoice.number))
    .await
    .expect("artifact stored");
  let text = String::from_utf8_lossy(&pdf);
  assert!(text.contains("(Item 0 "));
  assert!(text.contains("(Item 59 "));
  assert!(text.contains("(Grand total "));
  assert!(text.contains("(Balance due "));
  assert!(text.contains("/Count 2"));
  assert!(text.contains("600.00"));
}
