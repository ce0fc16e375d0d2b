// baton/examples/cancellation.rs

use baton::{async_stage, stage, BatonError, CancelPolicy, CancelToken, PipelineBuilder};
use std::time::Duration;
use tracing::{error, info};

fn slow(name: &'static str, delay: Duration) -> impl baton::Stage<u64, u64, Error = BatonError> {
  async_stage(name, move |n: u64| async move {
    tokio::time::sleep(delay).await;
    Ok::<_, BatonError>(n)
  })
}

async fn run_with(policy: CancelPolicy) {
  let token = CancelToken::with_timeout(Duration::from_millis(200));

  let pipeline = PipelineBuilder::<u64, _, BatonError>::new(stage("double", |n: u64| Ok::<_, BatonError>(n * 2)))
    .then(slow("slow_last", Duration::from_millis(500)))
    .cancel_policy(policy)
    .build_with_cancel(token);

  let mut pipeline = match pipeline {
    Ok(p) => p,
    Err(e) => {
      error!("Failed to build pipeline: {}", e);
      return;
    }
  };

  match pipeline.run(21).await {
    Ok(value) => info!("{:?}: finished with {}", policy, value),
    Err(e) if e.is_cancellation() => info!("{:?}: stopped early ({})", policy, e),
    Err(e) => error!("{:?}: failed: {}", policy, e),
  }

  for report in pipeline.progress() {
    info!("  stage '{}' ended as {:?}", report.name, report.state);
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  // The deadline passes while the last stage is running.
  info!("Scenario 1: BetweenStages lets the running stage finish");
  run_with(CancelPolicy::BetweenStages).await;

  info!("Scenario 2: Preemptive interrupts it");
  run_with(CancelPolicy::Preemptive).await;

  // Manual cancellation from another task.
  info!("Scenario 3: caller cancels");
  let token = CancelToken::new();
  let mut pipeline = match PipelineBuilder::<u64, _, BatonError>::new(slow("first", Duration::from_secs(1)))
    .then(slow("second", Duration::from_secs(1)))
    .build_with_cancel(token.clone())
  {
    Ok(p) => p,
    Err(e) => {
      error!("Failed to build pipeline: {}", e);
      return;
    }
  };

  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
  });

  let result = pipeline.run(1).await;
  info!("Manual cancel result: {:?}", result);
  pipeline.shutdown().await;
}
