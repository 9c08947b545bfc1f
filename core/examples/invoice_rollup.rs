// core/examples/invoice_rollup.rs

//! Rolls up a small invoice through a four-step pipeline: sum lines, apply an optional
//! discount, add tax, then a best-effort notification that fails without aborting.

use mandi_flow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, SkipCondition, StepPolicy};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct Rollup {
  line_totals_minor: Vec<i64>,
  discount_minor: Option<i64>,
  subtotal_minor: i64,
  grand_total_minor: i64,
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  let no_discount: SkipCondition<Rollup> = Arc::new(|ctx: ContextData<Rollup>| ctx.read().discount_minor.is_none());

  let mut pipeline = Pipeline::<Rollup, FlowError>::new(&[
    ("sum_lines", StepPolicy::Required, None),
    ("apply_discount", StepPolicy::Required, Some(no_discount)),
    ("add_tax", StepPolicy::Required, None),
    ("notify", StepPolicy::BestEffort, None),
  ]);

  pipeline.on_step("sum_lines", |ctx: ContextData<Rollup>| async move {
    let mut data = ctx.write();
    data.subtotal_minor = data.line_totals_minor.iter().sum();
    data.grand_total_minor = data.subtotal_minor;
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  pipeline.on_step("apply_discount", |ctx: ContextData<Rollup>| async move {
    let mut data = ctx.write();
    let discount = data.discount_minor.unwrap_or(0);
    data.grand_total_minor -= discount;
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  // 5% tax on the discounted amount, rounded down to the paisa.
  pipeline.on_step("add_tax", |ctx: ContextData<Rollup>| async move {
    let mut data = ctx.write();
    data.grand_total_minor += data.grand_total_minor * 5 / 100;
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  pipeline.on_step("notify", |_ctx: ContextData<Rollup>| async move {
    Err::<PipelineControl, _>(FlowError::Internal("notification service offline".to_string()))
  });

  let ctx = ContextData::new(Rollup {
    line_totals_minor: vec![42_000, 22_200],
    discount_minor: Some(4_200),
    ..Default::default()
  });

  let result = pipeline.run(ctx.clone()).await?;
  assert_eq!(result, PipelineResult::Completed);

  let data = ctx.read();
  info!(
    subtotal = data.subtotal_minor,
    grand_total = data.grand_total_minor,
    "Rollup finished despite the failed notification."
  );
  Ok(())
}
