// baton/examples/basic_pipeline.rs

use baton::{async_stage, stage, BatonError, PipelineBuilder, StageState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), BatonError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  // 1. Define the stages. Each edge may carry a different type.
  let concat = stage("concat", |s: String| Ok::<_, BatonError>(format!("{s}{s}")));
  let parse = stage("parse", |s: String| s.parse::<i64>().map_err(anyhow::Error::from).map_err(BatonError::from));
  let square = async_stage("square", |n: i64| async move {
    tokio::task::yield_now().await;
    Ok::<_, BatonError>(n * n)
  });

  // 2. Build the chain. Mismatched edges would not compile here.
  let mut pipeline = PipelineBuilder::<String, _, BatonError>::new(concat)
    .then(parse)
    .then(square)
    .named("basic")
    .build()?;

  info!("Built '{}' with {} stages", pipeline.name(), pipeline.stage_count());

  // 3. Feed the input and wait for the result.
  pipeline.input("42".to_string())?;
  let result = pipeline.output().await?;
  info!("Result: {}", result);

  // 4. Inspect per-stage progress.
  for report in pipeline.progress() {
    info!("- stage {} '{}': {:?} in {:?}", report.index, report.name, report.state, report.elapsed);
  }

  // "42" -> "4242" -> 4242 -> 4242 * 4242
  assert_eq!(result, 17994564);
  assert!(pipeline.progress().iter().all(|r| r.state == StageState::Completed));

  pipeline.shutdown().await;
  Ok(())
}
