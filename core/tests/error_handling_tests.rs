// tests/error_handling_tests.rs
mod common;
use baton::{stage, BatonError, PipelineBuilder, StageState};
use common::*;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::time::Duration;

// Built outside any runtime: if the count check didn't come first, this
// would fail with RuntimeUnavailable instead.
#[test]
fn test_single_stage_is_rejected_before_spawning() {
  let result = PipelineBuilder::<String, _, TestError>::new(parse_stage()).build();
  match result {
    Err(BatonError::InsufficientStages { count }) => assert_eq!(count, 1),
    Err(other) => panic!("Expected InsufficientStages, got {:?}", other),
    Ok(_) => panic!("Expected InsufficientStages, got a pipeline"),
  }
}

#[test]
fn test_build_outside_runtime_is_reported() {
  let result = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(square_stage())
    .build();
  assert!(matches!(result, Err(BatonError::RuntimeUnavailable)));
}

#[tokio::test]
#[serial]
async fn test_stage_error_propagates_verbatim_and_stops_chain() {
  setup_tracing();
  reset_counter(&STAGE_EXEC_COUNTER);

  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(counting_stage("before_failure", STAGE_EXEC_COUNTER.clone()))
    .then(failing_stage("bad_stage", "I am a bad stage!"))
    .then(counting_stage("never_run", STAGE_EXEC_COUNTER.clone()))
    .build()
    .unwrap();

  let result = pipeline.run("1".to_string()).await;
  assert_eq!(result, Err(TestError::Stage("I am a bad stage!".to_string())));

  // Let the abandoned worker notice its upstream is gone.
  tokio::time::sleep(Duration::from_millis(20)).await;

  assert_eq!(STAGE_EXEC_COUNTER.load(Ordering::SeqCst), 1);
  let states: Vec<StageState> = pipeline.progress().iter().map(|r| r.state).collect();
  assert_eq!(
    states,
    vec![
      StageState::Completed,
      StageState::Completed,
      StageState::Failed,
      StageState::Abandoned,
    ]
  );
}

#[tokio::test]
#[serial]
async fn test_parse_failure_surfaces_as_stage_error() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(concat_stage())
    .then(parse_stage())
    .then(square_stage())
    .build()
    .unwrap();

  match pipeline.run("forty-two".to_string()).await {
    Err(TestError::Stage(msg)) => assert!(msg.contains("invalid digit")),
    other => panic!("Expected TestError::Stage, got {:?}", other),
  }
}

// A pipeline whose error type IS BatonError, with stages failing through anyhow.
#[tokio::test]
#[serial]
async fn test_pipeline_with_baton_error_type() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, BatonError>::new(stage("parse", |s: String| {
    s.parse::<u8>().map_err(anyhow::Error::from)
  }))
  .then(stage("check", |n: u8| {
    if n % 2 == 0 {
      Ok(n)
    } else {
      Err(anyhow::anyhow!("{} is odd", n))
    }
  }))
  .build()
  .unwrap();

  match pipeline.run("7".to_string()).await {
    Err(BatonError::StageFailure { stage_name, source }) => {
      assert_eq!(stage_name, "check");
      assert_eq!(source.to_string(), "7 is odd");
    }
    other => panic!("Expected BatonError::StageFailure, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_input_and_output_are_single_use() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(square_stage())
    .build()
    .unwrap();

  pipeline.input("3".to_string()).unwrap();
  assert!(matches!(
    pipeline.input("4".to_string()),
    Err(BatonError::AlreadyConsumed { operation: "input" })
  ));

  assert_eq!(pipeline.output().await, Ok(9));
  match pipeline.output().await {
    Err(TestError::Baton(msg)) => assert!(msg.contains("AlreadyConsumed")),
    other => panic!("Expected AlreadyConsumed, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_panicking_stage_reports_worker_lost() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(stage("explode", |n: i64| -> Result<i64, TestError> {
      if n > 0 {
        panic!("stage blew up");
      }
      Ok(n)
    }))
    .then(square_stage())
    .build()
    .unwrap();

  match pipeline.run("1".to_string()).await {
    Err(TestError::Baton(msg)) => assert!(msg.contains("WorkerLost")),
    other => panic!("Expected WorkerLost, got {:?}", other),
  }
}
