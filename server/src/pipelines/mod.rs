// server/src/pipelines/mod.rs

//! The ledger workflows, each a `mandi_flow` pipeline keyed by its context type.

use crate::errors::AppError;
use mandi_flow::FlowRegistry;

pub mod common_steps;
pub mod contexts;

pub mod dispatch_pipeline;
pub mod order_pipeline;
pub mod payment_pipeline;

pub use dispatch_pipeline::dispatch_order;
pub use order_pipeline::place_order;
pub use payment_pipeline::{handle_gateway_event, PaymentOutcome};

/// Registers every pipeline with the registry. Called once while building `AppState`.
pub fn register_all_pipelines(flows: &FlowRegistry<AppError>) {
  order_pipeline::register_place_order_pipeline(flows);
  dispatch_pipeline::register_dispatch_pipeline(flows);
  payment_pipeline::register_payment_pipeline(flows);
  tracing::debug!("Order, dispatch and payment pipelines registered.");
}
