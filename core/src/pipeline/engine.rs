// baton/src/pipeline/engine.rs

//! The running pipeline handle: feed one value in, race the result against
//! the error collector, shut the workers down.

use crate::core::cancel::CancelToken;
use crate::core::report::{ProgressBoard, StageReport};
use crate::core::stage::StageDescriptor;
use crate::error::{BatonError, BatonResult};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

/// A wired chain of stages, one tokio task per stage, good for a single run.
///
/// Built with [`PipelineBuilder`](crate::PipelineBuilder). Each pipeline
/// accepts exactly one `input` and yields exactly one `output`; build a
/// fresh one per run. Dropping the pipeline aborts any worker still alive.
pub struct Pipeline<I, O, Err>
where
  I: Send + 'static,
  O: Send + 'static,
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  pub(crate) name: Arc<str>,
  pub(crate) descriptors: Vec<StageDescriptor>,
  pub(crate) input: Option<oneshot::Sender<I>>,
  pub(crate) output: Option<oneshot::Receiver<O>>,
  pub(crate) errors: mpsc::Receiver<Err>,
  pub(crate) cancel: Option<CancelToken>,
  pub(crate) workers: JoinSet<()>,
  pub(crate) shutdown: CancellationToken,
  pub(crate) board: ProgressBoard,
}

enum Settled<O, Err> {
  Value(O),
  Failed(Err),
  Closed,
}

impl<I, O, Err> Pipeline<I, O, Err>
where
  I: Send + 'static,
  O: Send + 'static,
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn stage_count(&self) -> usize {
    self.descriptors.len()
  }

  pub fn descriptors(&self) -> &[StageDescriptor] {
    &self.descriptors
  }

  /// Hands the initial value to the first stage. Does not wait for it to be processed.
  ///
  /// If the cancel token fired before the value could be delivered, the
  /// first worker has already left and the token's reason is returned.
  pub fn input(&mut self, value: I) -> BatonResult<()> {
    let sender = self
      .input
      .take()
      .ok_or(BatonError::AlreadyConsumed { operation: "input" })?;

    sender.send(value).map_err(|_| {
      // A worker only leaves its input wait early on shutdown or cancellation.
      if let Some(reason) = self.cancel.as_ref().and_then(CancelToken::reason) {
        event!(Level::INFO, pipeline = %self.name, reason = %reason, "Input refused; pipeline already cancelled.");
        return reason;
      }
      event!(Level::ERROR, pipeline = %self.name, "First worker is gone; input not delivered.");
      BatonError::WorkerLost
    })
  }

  /// Waits for the chain's final value or the first reported error, whichever comes first.
  ///
  /// There is no engine-side timeout; bound the wait with a deadline on the
  /// pipeline's [`CancelToken`](crate::CancelToken).
  #[instrument(
    name = "Pipeline::output",
    skip_all,
    fields(pipeline = %self.name, num_stages = self.descriptors.len()),
    err(Display)
  )]
  pub async fn output(&mut self) -> Result<O, Err> {
    let mut last = self
      .output
      .take()
      .ok_or_else(|| Err::from(BatonError::AlreadyConsumed { operation: "output" }))?;

    let settled = tokio::select! {
      biased;
      Some(err) = self.errors.recv() => Settled::Failed(err),
      received = &mut last => match received {
        Ok(value) => Settled::Value(value),
        Err(_) => Settled::Closed,
      },
    };

    match settled {
      Settled::Value(value) => {
        event!(Level::DEBUG, "Pipeline produced its output.");
        Ok(value)
      }
      Settled::Failed(err) => Err(err),
      // The last edge closed without a value: whoever broke the chain has
      // already reported, unless a worker died (panicked or was aborted).
      Settled::Closed => match self.errors.recv().await {
        Some(err) => Err(err),
        None => Err(Err::from(BatonError::WorkerLost)),
      },
    }
  }

  /// `input` then `output`.
  pub async fn run(&mut self, value: I) -> Result<O, Err> {
    self.input(value).map_err(Err::from)?;
    self.output().await
  }

  /// Reports that reached the collector after the one `output` returned.
  ///
  /// Only reports already delivered are returned; it does not wait.
  pub fn drain_errors(&mut self) -> Vec<Err> {
    let mut drained = Vec::new();
    while let Ok(err) = self.errors.try_recv() {
      drained.push(err);
    }
    drained
  }

  /// Current state of every stage.
  pub fn progress(&self) -> Vec<StageReport> {
    self.board.snapshot()
  }

  /// Signals every worker to stop and waits for all of them to exit.
  #[instrument(name = "Pipeline::shutdown", skip_all, fields(pipeline = %self.name))]
  pub async fn shutdown(mut self) {
    self.shutdown.cancel();
    while let Some(joined) = self.workers.join_next().await {
      if let Err(e) = joined {
        if e.is_panic() {
          event!(Level::WARN, error = %e, "Worker panicked.");
        }
      }
    }
    event!(Level::DEBUG, "All workers joined.");
  }
}
