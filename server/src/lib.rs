// server/src/lib.rs

//! Mandi commerce backend: order placement, dispatch with invoice issuance, and gateway
//! payment reconciliation, each run as a `mandi_flow` pipeline over a transactional
//! ledger store.

pub mod config;
pub mod errors;
pub mod models;
pub mod money;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: `RUST_LOG` filtering (default `info`), span-close
/// events, and JSON lines when `json` is set. A second call is a no-op.
pub fn init_tracing(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  let installed = if json { builder.json().try_init() } else { builder.try_init() };
  if installed.is_err() {
    tracing::debug!("Tracing subscriber already installed.");
  }
}
