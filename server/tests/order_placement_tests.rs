// tests/order_placement_tests.rs

mod common;

use common::*;
use mandi_server::errors::AppError;
use mandi_server::models::{OrderPaymentStatus, OrderStatus};
use mandi_server::pipelines::contexts::PlaceOrderRequest;
use mandi_server::pipelines::place_order;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn places_an_order_from_catalog_and_adhoc_lines() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let seller = app.seed_seller().await;
  let atta = app.seed_product("Aashirvaad Atta 10kg", dec("420.00"), Some("Aashirvaad")).await;

  let mut branded = catalog_item(atta.id, 3);
  branded.brand = Some("House Brand".to_string());
  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    seller_id: Some(seller.id),
    items: vec![branded, adhoc_item("Loose Jaggery", "55.50", 4)],
    ..Default::default()
  };

  let order = place_order(&app.state, request).await.expect("order placed");

  assert_eq!(order.status, OrderStatus::Confirmed);
  assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
  assert_eq!(order.seller_id, Some(seller.id));
  assert!(order.audit_trail.is_empty());

  assert_eq!(order.items.len(), 2);
  let catalog_line = &order.items[0];
  assert_eq!(catalog_line.product_id, Some(atta.id));
  assert_eq!(catalog_line.quantity, 3);
  assert_eq!(catalog_line.line_total, dec("1260.00"));
  assert_eq!(catalog_line.brand.as_deref(), Some("House Brand"));
  assert_eq!(catalog_line.gst_rate, Decimal::from(5));

  let adhoc_line = &order.items[1];
  assert_eq!(adhoc_line.product_id, None);
  assert_eq!(adhoc_line.name.as_deref(), Some("Loose Jaggery"));
  assert_eq!(adhoc_line.line_total, dec("222.00"));

  assert_eq!(order.total_amount, dec("1482.00"));
  assert_eq!(order.final_amount, dec("1482.00"));
  assert_eq!(order.brand_totals.get("House Brand"), Some(&dec("1260.00")));
  assert_eq!(order.brand_totals.len(), 1);

  let number = order.order_number.clone().expect("order number");
  assert!(number.starts_with("ORD-"));
  assert_eq!(number.len(), "ORD-YYYYMMDD-XXXXXXXX".len());

  let stored = app.store().find_order(order.id).await.unwrap().expect("persisted");
  assert_eq!(stored, order);
}

#[tokio::test]
async fn unknown_catalog_products_are_dropped_silently() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let rice = app.seed_product("Sona Masoori 25kg", dec("1150.00"), None).await;

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![catalog_item(Uuid::new_v4(), 1), catalog_item(rice.id, 1)],
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order placed");

  assert_eq!(order.items.len(), 1);
  assert_eq!(order.items[0].product_id, Some(rice.id));
  assert_eq!(order.final_amount, dec("1150.00"));
}

#[tokio::test]
async fn an_order_with_nothing_resolvable_is_rejected_and_not_stored() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![catalog_item(Uuid::new_v4(), 2)],
    ..Default::default()
  };
  let err = place_order(&app.state, request).await.unwrap_err();

  assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
  assert!(app.store().list_orders_for_buyer(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn requests_are_validated_before_anything_is_written() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let no_buyer = PlaceOrderRequest {
    items: vec![adhoc_item("Salt", "20.00", 1)],
    ..Default::default()
  };
  assert!(matches!(place_order(&app.state, no_buyer).await, Err(AppError::InvalidInput(_))));

  let no_items = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    ..Default::default()
  };
  assert!(matches!(place_order(&app.state, no_items).await, Err(AppError::InvalidInput(_))));

  let mut priceless = adhoc_item("Mystery sack", "0", 1);
  priceless.price = None;
  let unpriced = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![priceless],
    ..Default::default()
  };
  assert!(matches!(place_order(&app.state, unpriced).await, Err(AppError::InvalidInput(_))));

  let unknown_buyer = PlaceOrderRequest {
    buyer_id: Some(Uuid::new_v4()),
    items: vec![adhoc_item("Salt", "20.00", 1)],
    ..Default::default()
  };
  assert!(matches!(place_order(&app.state, unknown_buyer).await, Err(AppError::NotFound(_))));

  assert!(app.store().list_orders_for_buyer(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn shipping_override_is_snapshotted_and_saved_on_the_buyer() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;
  let new_address = shop_address("Shop 4, Aminabad Market");

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Mustard Oil 1L", "180.00", 6)],
    shipping: Some(new_address.clone()),
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order placed");
  assert_eq!(order.shipping_address.as_ref(), Some(&new_address));

  let reloaded = app.store().find_buyer(buyer.id).await.unwrap().expect("buyer");
  assert_eq!(reloaded.shop_address, Some(new_address));
}

#[tokio::test]
async fn saved_shop_address_is_used_when_no_override_is_given() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let order = app.place_simple_order(&buyer).await;

  assert_eq!(order.shipping_address, buyer.shop_address);
}

#[tokio::test]
async fn caller_totals_override_the_computed_ones() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Toor Dal 30kg", "3300.00", 1)],
    discount_amount: Some(dec("100.00")),
    gst_amount: Some(dec("160.00")),
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order placed");

  assert_eq!(order.total_amount, dec("3300.00"));
  assert_eq!(order.final_amount, dec("3360.00"));

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Toor Dal 30kg", "3300.00", 1)],
    final_amount: Some(dec("3250.00")),
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order placed");
  assert_eq!(order.final_amount, dec("3250.00"));
}

#[tokio::test]
async fn string_quantities_are_accepted() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let mut line = adhoc_item("Sugar 50kg", "2100.00", 1);
  line.quantity = Some(json!("3"));
  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![line],
    ..Default::default()
  };
  let order = place_order(&app.state, request).await.expect("order placed");

  assert_eq!(order.items[0].quantity, 3);
  assert_eq!(order.total_amount, dec("6300.00"));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_without_panicking() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let request = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Bulk Wheat", "79228162514264337593543950335", 2)],
    ..Default::default()
  };
  let state = app.state.clone();
  let joined = tokio::spawn(async move { place_order(&state, request).await }).await;

  let err = joined.expect("placement must not panic").unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
  assert!(app.store().list_orders_for_buyer(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_or_over_discounted_totals_are_rejected() {
  let app = TestApp::new();
  let buyer = app.seed_buyer().await;

  let negative_final = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Mustard Oil 1L", "100.00", 1)],
    final_amount: Some(dec("-50.00")),
    ..Default::default()
  };
  let err = place_order(&app.state, negative_final).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);

  let negative_gst = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Mustard Oil 1L", "100.00", 1)],
    gst_amount: Some(dec("-5.00")),
    ..Default::default()
  };
  let err = place_order(&app.state, negative_gst).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);

  let over_discounted = PlaceOrderRequest {
    buyer_id: Some(buyer.id),
    items: vec![adhoc_item("Mustard Oil 1L", "100.00", 1)],
    discount_amount: Some(dec("150.00")),
    ..Default::default()
  };
  let err = place_order(&app.state, over_discounted).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);

  assert!(app.store().list_orders_for_buyer(buyer.id).await.unwrap().is_empty());
}
