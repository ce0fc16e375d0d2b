// baton/examples/dynamic_pipeline.rs

use baton::{stage, BatonError, DynPipelineBuilder, DynStage};
use tracing::{error, info};

// A stage list assembled at runtime, e.g. from configuration.
fn stages_for(names: &[&str]) -> Vec<DynStage<BatonError>> {
  names
    .iter()
    .filter_map(|name| match *name {
      "trim" => Some(DynStage::new(stage("trim", |s: String| Ok::<_, BatonError>(s.trim().to_string())))),
      "len" => Some(DynStage::new(stage("len", |s: String| Ok::<_, BatonError>(s.len())))),
      "double" => Some(DynStage::new(stage("double", |n: usize| Ok::<_, BatonError>(n * 2)))),
      other => {
        error!("Unknown stage '{}', skipping", other);
        None
      }
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<(), BatonError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  // Scenario 1: a valid chain.
  let mut pipeline = DynPipelineBuilder::from_stages(stages_for(&["trim", "len", "double"]))
    .named("configured")
    .build()?;
  info!(
    "Accepts {:?}, yields {:?}",
    pipeline.input_type(),
    pipeline.output_type()
  );

  let result: usize = pipeline.run("  hello  ".to_string()).await?;
  info!("Result: {}", result);
  assert_eq!(result, 10);

  // Scenario 2: an invalid ordering is caught before anything runs.
  match DynPipelineBuilder::from_stages(stages_for(&["len", "trim"])).build() {
    Ok(_) => error!("Unexpectedly built a mistyped chain"),
    Err(e) => info!("Rejected at build time: {}", e),
  }

  // Scenario 3: the wrong input type is refused without consuming the pipeline.
  let mut pipeline = DynPipelineBuilder::from_stages(stages_for(&["len", "double"])).build()?;
  if let Err(e) = pipeline.input(42_u32) {
    info!("Rejected input: {}", e);
  }
  pipeline.input("abc".to_string())?;
  let result = pipeline.output_as::<usize>().await?;
  assert_eq!(result, 6);
  info!("Second attempt: {}", result);

  pipeline.shutdown().await;
  Ok(())
}
