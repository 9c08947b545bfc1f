// server/src/web/actor.rs

//! Caller identity from the `X-Actor-Id` / `X-Actor-Role` headers set by the
//! upstream auth proxy.

use crate::errors::AppError;
use crate::models::{Actor, ActorRole};
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

fn actor_from_headers(req: &HttpRequest) -> Result<Actor, AppError> {
  let id = header(req, ACTOR_ID_HEADER)
    .ok_or_else(|| AppError::Forbidden(format!("Missing {} header", ACTOR_ID_HEADER)))?;
  let role = header(req, ACTOR_ROLE_HEADER)
    .ok_or_else(|| AppError::Forbidden(format!("Missing {} header", ACTOR_ROLE_HEADER)))?
    .parse::<ActorRole>()
    .map_err(AppError::Forbidden)?;
  Ok(Actor::new(id, role))
}

impl FromRequest for Actor {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = actor_from_headers(req);
    if let Err(e) = &result {
      warn!(error = %e, path = %req.path(), "Rejected request without a usable actor.");
    }
    ready(result)
  }
}
