// tests/flow_engine_tests.rs
mod common;

use common::*;
use lmi_checkout::{ContextData, Flow, FlowOutcome, StepControl};

fn three_step_flow() -> Flow<TestContext, TestError> {
  let mut flow = Flow::<TestContext, TestError>::new("test", &[("step1", false), ("step2", false), ("step3", false)]);
  flow.on_step("step1", |ctx| record_step(ctx, "step1"));
  flow.on_step("step2", |ctx| record_step(ctx, "step2"));
  flow.on_step("step3", |ctx| record_step(ctx, "step3"));
  flow
}

#[tokio::test]
async fn test_flow_runs_steps_in_order() {
  setup_tracing();
  let flow = three_step_flow();
  assert_eq!(flow.step_names(), vec!["step1", "step2", "step3"]);

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result, Ok(FlowOutcome::Completed));
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
  assert!(guard.compensated.is_empty());
}

#[tokio::test]
async fn test_flow_stops_without_compensating() {
  setup_tracing();
  let mut flow = three_step_flow();
  flow.compensate("step1", |ctx| record_compensation(ctx, "step1"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("step2".to_string()),
    ..Default::default()
  });
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result, Ok(FlowOutcome::Stopped));
  let guard = ctx.read();
  assert_eq!(guard.steps_executed, vec!["step1", "step2"]);
  assert!(guard.compensated.is_empty());
}

#[tokio::test]
async fn test_failure_unwinds_completed_steps_in_reverse() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "unwind",
    &[("reserve", false), ("charge", false), ("persist", false), ("never", false)],
  );
  flow.on_step("reserve", |ctx| record_step(ctx, "reserve"));
  flow.on_step("charge", |ctx| record_step(ctx, "charge"));
  flow.on_step("persist", |ctx| fail_step(ctx, "persist"));
  flow.on_step("never", |ctx| record_step(ctx, "never"));
  flow.compensate("reserve", |ctx| record_compensation(ctx, "reserve"));
  flow.compensate("charge", |ctx| record_compensation(ctx, "charge"));
  flow.compensate("persist", |ctx| record_compensation(ctx, "persist"));
  flow.compensate("never", |ctx| record_compensation(ctx, "never"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result, Err(TestError::Handler("persist failed".to_string())));
  let guard = ctx.read();
  assert_eq!(guard.steps_executed, vec!["reserve", "charge", "persist"]);
  // The failing step undoes its own partial work first, then the earlier ones.
  assert_eq!(guard.compensated, vec!["persist", "charge", "reserve"]);
}

#[tokio::test]
async fn test_optional_step_failure_is_swallowed() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("optional", &[("main", false), ("notify", true), ("after", false)]);
  flow.on_step("main", |ctx| record_step(ctx, "main"));
  flow.on_step("notify", |ctx| fail_step(ctx, "notify"));
  flow.on_step("after", |ctx| record_step(ctx, "after"));
  flow.compensate("main", |ctx| record_compensation(ctx, "main"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result, Ok(FlowOutcome::Completed));
  let guard = ctx.read();
  assert_eq!(guard.steps_executed, vec!["main", "notify", "after"]);
  assert!(guard.compensated.is_empty());
}

#[tokio::test]
async fn test_optional_step_without_handler_is_skipped() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("skip", &[("main", false), ("extra", true)]);
  flow.on_step("main", |ctx| record_step(ctx, "main"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await, Ok(FlowOutcome::Completed));
  assert_eq!(ctx.read().steps_executed, vec!["main"]);
}

#[tokio::test]
async fn test_required_step_without_handler_fails_and_unwinds() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("missing", &[("first", false), ("unhandled", false)]);
  flow.on_step("first", |ctx| record_step(ctx, "first"));
  flow.compensate("first", |ctx| record_compensation(ctx, "first"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  match result {
    Err(TestError::Flow(message)) => assert!(message.contains("unhandled"), "unexpected message: {}", message),
    other => panic!("expected a flow error, got {:?}", other),
  }
  assert_eq!(ctx.read().compensated, vec!["first"]);
}

#[tokio::test]
async fn test_multiple_handlers_on_one_step_run_in_registration_order() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("multi", &[("only", false)]);
  flow.on_step("only", |ctx| record_step(ctx, "first_handler"));
  flow.on_step("only", |ctx: ContextData<TestContext>| async move {
    ctx.write().steps_executed.push("second_handler".to_string());
    Ok::<_, TestError>(StepControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().steps_executed, vec!["first_handler", "second_handler"]);
}

#[test]
#[should_panic(expected = "step 'nope' is not defined")]
fn test_registering_unknown_step_panics() {
  let mut flow = Flow::<TestContext, TestError>::new("typo", &[("real", false)]);
  flow.on_step("nope", |ctx| record_step(ctx, "nope"));
}
