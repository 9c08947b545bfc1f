// server/src/web/routes.rs

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::warn;

use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::web::handlers::{invoice_handlers, order_handlers, party_handlers, product_handlers, webhook_handlers};

/// Reports whether the ledger store answers.
async fn health_check_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  app_state.store.ping().await?;
  Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  warn!(error = %err, "Rejected JSON body.");
  AppError::InvalidInput(format!("Invalid JSON body: {}", err)).into()
}

/// JSON extractor settings: body errors come back as `invalid_input`.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().limit(256 * 1024).error_handler(json_error_handler)
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/products")
          .route("", web::post().to(product_handlers::create_product_handler))
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler)),
      )
      .service(
        web::scope("/buyers")
          .route("", web::post().to(party_handlers::create_buyer_handler))
          .route("/{buyer_id}", web::get().to(party_handlers::get_buyer_handler))
          .route("/{buyer_id}/orders", web::get().to(party_handlers::list_buyer_orders_handler))
          .route(
            "/{buyer_id}/notifications",
            web::get().to(party_handlers::list_buyer_notifications_handler),
          ),
      )
      .service(
        web::scope("/sellers")
          .route("", web::post().to(party_handlers::create_seller_handler))
          .route("/{seller_id}", web::get().to(party_handlers::get_seller_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::place_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/dispatch", web::post().to(order_handlers::dispatch_order_handler))
          .route("/{order_id}/status", web::post().to(order_handlers::update_order_status_handler)),
      )
      .service(
        web::scope("/invoices")
          .route("/{number}", web::get().to(invoice_handlers::get_invoice_handler))
          .route("/{number}/payments", web::get().to(invoice_handlers::list_invoice_payments_handler))
          .route("/{number}/qr", web::post().to(invoice_handlers::request_invoice_qr_handler))
          .route(
            "/{number}/document",
            web::post().to(invoice_handlers::render_invoice_document_handler),
          ),
      )
      .route(
        "/files/invoices/{file_name}",
        web::get().to(invoice_handlers::download_invoice_file_handler),
      )
      .route("/payments/webhook", web::post().to(webhook_handlers::payment_webhook_handler)),
  );
}
