// tests/pipeline_execution_tests.rs
mod common; // Reference the common module

use async_trait::async_trait;
use baton::{async_stage, stage, PipelineBuilder, Stage, StageExt, StageState};
use common::*;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn test_pipeline_chains_stages_in_order() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(concat_stage())
    .then(parse_stage())
    .then(square_stage())
    .build()
    .expect("valid chain");

  assert_eq!(pipeline.stage_count(), 3);

  pipeline.input("42".to_string()).unwrap();
  let result = pipeline.output().await;

  // "42" -> "4242" -> 4242 -> 4242²
  assert_eq!(result, Ok(17994564));
}

#[tokio::test]
#[serial]
async fn test_pipeline_run_is_input_then_output() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(square_stage())
    .named("parse_and_square")
    .build()
    .unwrap();

  assert_eq!(pipeline.name(), "parse_and_square");
  assert_eq!(pipeline.run("12".to_string()).await, Ok(144));
}

#[tokio::test]
#[serial]
async fn test_pipeline_changes_type_at_every_edge() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<&'static str, _, TestError>::new(stage("len", |s: &'static str| {
    Ok::<_, TestError>(s.len())
  }))
  .then(stage("halve", |n: usize| Ok::<_, TestError>(n as f64 / 2.0)))
  .then(stage("describe", |x: f64| Ok::<_, TestError>(format!("{x:.1}"))))
  .build()
  .unwrap();

  assert_eq!(pipeline.run("abcde").await, Ok("2.5".to_string()));

  let descriptors = pipeline.descriptors();
  assert_eq!(descriptors[0].name, "len");
  assert_eq!(descriptors[1].input.name, std::any::type_name::<usize>());
  assert_eq!(descriptors[2].output.name, std::any::type_name::<String>());
}

#[tokio::test]
#[serial]
async fn test_pipeline_runs_async_stages() {
  setup_tracing();
  let fetch = async_stage("fetch", |id: u32| async move {
    tokio::task::yield_now().await;
    Ok::<_, TestError>(format!("record-{id}"))
  });
  let shout = async_stage("shout", |s: String| async move { Ok::<_, TestError>(s.to_uppercase()) });

  let mut pipeline = PipelineBuilder::<u32, _, TestError>::new(fetch).then(shout).build().unwrap();
  assert_eq!(pipeline.run(7).await, Ok("RECORD-7".to_string()));
}

// A hand-written Stage impl rather than a closure adapter.
struct Multiply {
  factor: i64,
}

#[async_trait]
impl Stage<i64, i64> for Multiply {
  type Error = TestError;

  async fn process(&self, input: i64) -> Result<i64, TestError> {
    Ok(input * self.factor)
  }

  fn name(&self) -> &str {
    "multiply"
  }
}

#[tokio::test]
#[serial]
async fn test_pipeline_accepts_custom_stage_impls() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(Multiply { factor: 3 })
    .then(Multiply { factor: -1 })
    .build()
    .unwrap();

  assert_eq!(pipeline.run("5".to_string()).await, Ok(-15));
  assert_eq!(pipeline.descriptors()[1].name, "multiply");
}

#[tokio::test]
#[serial]
async fn test_composed_stage_counts_as_one_worker() {
  setup_tracing();
  let fused = parse_stage().and_then(square_stage());

  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(concat_stage())
    .then(fused)
    .build()
    .unwrap();

  assert_eq!(pipeline.stage_count(), 2);
  assert_eq!(pipeline.descriptors()[1].name, "parse -> square");
  assert_eq!(pipeline.run("42".to_string()).await, Ok(17994564));
}

#[tokio::test]
#[serial]
async fn test_progress_reports_completed_stages() {
  setup_tracing();
  reset_counter(&STAGE_EXEC_COUNTER);

  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(counting_stage("count_a", STAGE_EXEC_COUNTER.clone()))
    .then(counting_stage("count_b", STAGE_EXEC_COUNTER.clone()))
    .build()
    .unwrap();

  assert!(pipeline.progress().iter().all(|r| r.state == StageState::Pending));

  assert_eq!(pipeline.run("9".to_string()).await, Ok(9));
  assert_eq!(STAGE_EXEC_COUNTER.load(Ordering::SeqCst), 2);

  let progress = pipeline.progress();
  assert_eq!(progress.len(), 3);
  assert!(progress.iter().all(|r| r.state == StageState::Completed));
  assert!(progress.iter().all(|r| r.elapsed.is_some()));

  pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_progress_elapsed_follows_the_runtime_clock() {
  setup_tracing();
  let mut pipeline = PipelineBuilder::<String, _, TestError>::new(parse_stage())
    .then(slow_stage("slow", Duration::from_secs(2)))
    .build()
    .unwrap();

  assert_eq!(pipeline.run("4".to_string()).await, Ok(4));

  // Paused time advances instantly, so only a tokio clock sees the two seconds.
  let elapsed = pipeline.progress()[1].elapsed.expect("stage ran");
  assert!(elapsed >= Duration::from_secs(2), "elapsed was {:?}", elapsed);
}
