// tests/common/mod.rs
#![allow(dead_code)]

use mandi_flow::{ContextData, FlowError, Handler, PipelineControl};
use once_cell::sync::Lazy;
use tracing::Level;

/// Running tally used by the engine tests: each step posts an amount and records itself.
#[derive(Clone, Debug, Default)]
pub struct TallyContext {
  pub balance_minor: i64,
  pub trail: Vec<String>,
  pub stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TallyError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("posting rejected: {0}")]
  Rejected(String),
}

impl From<FlowError> for TallyError {
  fn from(err: FlowError) -> Self {
    TallyError::Flow(format!("{:?}", err))
  }
}

/// Posts `amount_minor` and appends `label` to the trail; stops if `stop_at` names it.
pub fn posting_handler(label: &'static str, amount_minor: i64) -> Handler<TallyContext, TallyError> {
  Box::new(move |ctx: ContextData<TallyContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.balance_minor += amount_minor;
      guard.trail.push(label.to_string());
      if guard.stop_at.as_deref() == Some(label) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

/// Records `label` and then fails.
pub fn rejecting_handler(label: &'static str, reason: &'static str) -> Handler<TallyContext, TallyError> {
  Box::new(move |ctx: ContextData<TallyContext>| {
    Box::pin(async move {
      ctx.write().trail.push(label.to_string());
      Err(TallyError::Rejected(reason.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
