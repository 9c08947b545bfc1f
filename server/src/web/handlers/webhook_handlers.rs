// server/src/web/handlers/webhook_handlers.rs

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::Result;
use crate::pipelines::handle_gateway_event;
use crate::services::gateway::GatewayPayload;
use crate::state::AppState;

fn is_json(req: &HttpRequest) -> bool {
  req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map_or(false, |ct| ct.to_ascii_lowercase().contains("json"))
}

/// Gateway payment callback. The gateway sends either a form post or JSON; both are
/// reconciled the same way and answered with `{"ok": true}`.
#[instrument(
  name = "handler::payment_webhook",
  skip(app_state, req, body),
  fields(content_type = ?req.headers().get(header::CONTENT_TYPE), size = body.len())
)]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse> {
  let payload = if is_json(&req) {
    GatewayPayload::Json(body)
  } else {
    GatewayPayload::Form(body)
  };

  let outcome = handle_gateway_event(app_state.get_ref(), payload).await?;
  info!(
    payment_id = %outcome.payment_id,
    invoice = %outcome.invoice_number,
    applied = outcome.applied,
    "Gateway callback reconciled."
  );
  Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
