// baton/src/pipeline/worker.rs

//! The single-shot worker that runs one stage of a pipeline.

use crate::core::cancel::{wait_triggered, CancelPolicy, CancelToken};
use crate::core::report::{ProgressBoard, StageState};
use crate::core::stage::Stage;
use crate::error::BatonError;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

/// Everything a worker shares with the rest of its pipeline.
pub(crate) struct WorkerLink<Err> {
  pub(crate) index: usize,
  pub(crate) errors: mpsc::Sender<Err>,
  pub(crate) cancel: Option<CancelToken>,
  pub(crate) shutdown: CancellationToken,
  pub(crate) policy: CancelPolicy,
  pub(crate) board: ProgressBoard,
}

impl<Err> WorkerLink<Err>
where
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  // The collector holds one slot per stage and each worker reports at most
  // once, so this never finds it full.
  fn report(&self, err: Err, state: StageState) {
    self.board.finish(self.index, state);
    if let Err(e) = self.errors.try_send(err) {
      event!(Level::WARN, error = %e, "Error collector rejected report.");
    }
  }

  fn report_cancel(&self, reason: BatonError) {
    event!(Level::INFO, reason = %reason, "Worker observed cancellation.");
    self.report(Err::from(reason), StageState::Cancelled);
  }

  fn abandon(&self, why: &'static str) {
    event!(Level::TRACE, why, "Worker exiting without running its stage.");
    self.board.finish(self.index, StageState::Abandoned);
  }
}

enum Outcome<O, Err> {
  Done(O),
  Failed(Err),
  Cancelled(BatonError),
}

/// Receive one value, run the stage once, forward or report, exit.
pub(crate) async fn run_worker<S, I, O, Err>(
  stage: S,
  input: oneshot::Receiver<I>,
  output: oneshot::Sender<O>,
  link: WorkerLink<Err>,
) where
  S: Stage<I, O>,
  S::Error: Into<Err>,
  I: Send + 'static,
  O: Send + 'static,
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  event!(Level::TRACE, "Worker waiting for input.");

  let value = tokio::select! {
    biased;
    _ = link.shutdown.cancelled() => {
      link.abandon("pipeline shut down");
      return;
    }
    reason = wait_triggered(link.cancel.as_ref()) => {
      link.report_cancel(reason);
      return;
    }
    received = input => match received {
      Ok(value) => value,
      Err(_) => {
        link.abandon("upstream closed");
        return;
      }
    },
  };

  // Last look at the token before the stage is invoked.
  if let Some(Err(reason)) = link.cancel.as_ref().map(CancelToken::check) {
    link.report_cancel(reason);
    return;
  }

  event!(Level::DEBUG, "Invoking stage.");
  link.board.start(link.index);

  let invoke = async {
    match (link.policy, link.cancel.as_ref()) {
      (CancelPolicy::Preemptive, Some(token)) => {
        tokio::select! {
          biased;
          reason = token.triggered() => Outcome::Cancelled(reason),
          result = stage.process(value) => match result {
            Ok(out) => Outcome::Done(out),
            Err(e) => Outcome::Failed(e.into()),
          },
        }
      }
      _ => match stage.process(value).await {
        Ok(out) => Outcome::Done(out),
        Err(e) => Outcome::Failed(e.into()),
      },
    }
  };

  let outcome = tokio::select! {
    biased;
    _ = link.shutdown.cancelled() => {
      link.abandon("pipeline shut down mid-stage");
      return;
    }
    outcome = invoke => outcome,
  };

  match outcome {
    Outcome::Done(out) => {
      link.board.finish(link.index, StageState::Completed);
      if output.send(out).is_err() {
        event!(Level::TRACE, "Downstream receiver gone; output dropped.");
      } else {
        event!(Level::DEBUG, "Stage completed, output handed downstream.");
      }
    }
    Outcome::Failed(mut err) => {
      if let Some(baton_err) = (&mut err as &mut dyn Any).downcast_mut::<BatonError>() {
        baton_err.attribute_to(stage.name());
      }
      event!(Level::ERROR, error = %err, "Stage failed.");
      link.report(err, StageState::Failed);
    }
    Outcome::Cancelled(reason) => link.report_cancel(reason),
  }
}
