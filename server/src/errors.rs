// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use mandi_flow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Invalid Input: {0}")]
  InvalidInput(String),

  #[error("Malformed Payload: {0}")]
  MalformedPayload(String),

  #[error("Invalid State: {0}")]
  InvalidState(String),

  #[error("Invalid Signature: {0}")]
  InvalidSignature(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Stable machine-readable kind, used as the `error` field of response bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::NotFound(_) => "not_found",
      AppError::InvalidInput(_) => "invalid_input",
      AppError::MalformedPayload(_) => "malformed_payload",
      AppError::InvalidState(_) => "invalid_state",
      AppError::InvalidSignature(_) => "invalid_signature",
      AppError::Forbidden(_) => "forbidden",
      AppError::Conflict(_) => "conflict",
      AppError::Gateway(_) => "gateway_error",
      AppError::Config(_) => "configuration_error",
      AppError::Sqlx(_) => "database_error",
      AppError::Workflow { .. } => "workflow_error",
      AppError::Internal(_) => "internal_error",
    }
  }
}

// Lets handlers use `?` on anyhow results; errors that started life as AppError or
// sqlx::Error keep their variant.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<AppError>() {
      Ok(app_err) => return app_err,
      Err(err) => err,
    };
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::InvalidInput(_) | AppError::MalformedPayload(_) | AppError::InvalidSignature(_) => {
        StatusCode::BAD_REQUEST
      }
      AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }

    // Database and workflow internals stay in the logs.
    let message = match self {
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Workflow { .. } => "Workflow processing error".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": self.kind(), "message": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_errors_map_to_4xx() {
    assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::InvalidSignature("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::MalformedPayload("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::InvalidState("x".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
  }

  #[test]
  fn anyhow_keeps_wrapped_app_error() {
    let wrapped = anyhow::Error::new(AppError::InvalidInput("no lines".into()));
    match AppError::from(wrapped) {
      AppError::InvalidInput(msg) => assert_eq!(msg, "no lines"),
      other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(AppError::from(anyhow::anyhow!("boom")), AppError::Internal(_)));
  }
}
