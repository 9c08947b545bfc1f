// tests/error_handling_tests.rs
mod common;

use common::*;
use mandi_flow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, StepPolicy};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn required_step_without_handlers_reports_handler_missing() {
  setup_tracing();
  let pipeline = Pipeline::<TallyContext, TallyError>::new(&[("unwired", StepPolicy::Required, None)]);
  let result = pipeline.run(ContextData::new(TallyContext::default())).await;

  match result {
    Err(TallyError::Flow(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("unwired"));
    }
    other => panic!("Expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_and_best_effort_steps_may_be_unwired() {
  setup_tracing();
  let mut pipeline = Pipeline::<TallyContext, TallyError>::new(&[
    ("maybe", StepPolicy::Optional, None),
    ("try", StepPolicy::BestEffort, None),
    ("post", StepPolicy::Required, None),
  ]);
  pipeline.on_step("post", posting_handler("post", 1));

  let ctx = ContextData::new(TallyContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await, Ok(PipelineResult::Completed));
  assert_eq!(ctx.read().trail, vec!["post"]);
}

#[tokio::test]
#[serial]
async fn optional_step_errors_still_abort() {
  setup_tracing();
  let mut pipeline = Pipeline::<TallyContext, TallyError>::new(&[
    ("maybe", StepPolicy::Optional, None),
    ("post", StepPolicy::Required, None),
  ]);
  pipeline.on_step("maybe", rejecting_handler("maybe", "bad input"));
  pipeline.on_step("post", posting_handler("post", 1));

  let result = pipeline.run(ContextData::new(TallyContext::default())).await;
  assert_eq!(result, Err(TallyError::Rejected("bad input".to_string())));
}

#[tokio::test]
#[serial]
async fn pipeline_can_use_flow_error_directly() {
  setup_tracing();
  let mut pipeline = Pipeline::<TallyContext, FlowError>::new(&[("fail", StepPolicy::Required, None)]);
  pipeline.on_step("fail", |_ctx: ContextData<TallyContext>| {
    Box::pin(async move { Err::<PipelineControl, _>(FlowError::Internal("ledger closed".to_string())) })
  });

  match pipeline.run(ContextData::new(TallyContext::default())).await {
    Err(FlowError::Internal(msg)) => assert_eq!(msg, "ledger closed"),
    other => panic!("Expected FlowError::Internal, got {:?}", other),
  }
}

#[test]
#[should_panic(expected = "not part of this pipeline")]
fn registering_handler_for_unknown_step_panics() {
  let mut pipeline = Pipeline::<TallyContext, TallyError>::new(&[("post", StepPolicy::Required, None)]);
  pipeline.on_step("typo", posting_handler("typo", 0));
}
