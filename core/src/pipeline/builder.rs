// baton/src/pipeline/builder.rs

//! Compile-time typed construction of a pipeline.
//!
//! Each `then` call appends a stage whose input type must be the previous
//! stage's output type, so a chain that doesn't line up never compiles.
//! `build` then validates the recorded descriptors, checks the stage count
//! and spawns one worker per stage.

use crate::core::cancel::{CancelPolicy, CancelToken};
use crate::core::report::ProgressBoard;
use crate::core::stage::{Stage, StageDescriptor};
use crate::error::{BatonError, BatonResult};
use crate::pipeline::engine::Pipeline;
use crate::pipeline::worker::{run_worker, WorkerLink};
use crate::validation;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, span, Instrument, Level};

/// Run-level settings for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
  /// Shows up in tracing spans and events.
  pub name: String,
  pub cancel_policy: CancelPolicy,
}

impl Default for PipelineOptions {
  fn default() -> Self {
    Self {
      name: String::from("pipeline"),
      cancel_policy: CancelPolicy::default(),
    }
  }
}

// Deferred wiring: given the receiving end of this chain's input edge,
// spawn the chain's workers and return the receiving end of its output edge.
type Wire<I, O, Err> = Box<dyn FnOnce(oneshot::Receiver<I>, &mut Wiring<Err>) -> oneshot::Receiver<O> + Send>;

fn wire<I, O, Err, F>(f: F) -> Wire<I, O, Err>
where
  F: FnOnce(oneshot::Receiver<I>, &mut Wiring<Err>) -> oneshot::Receiver<O> + Send + 'static,
{
  Box::new(f)
}

/// Builder for a `Pipeline<I, O, Err>`, growing one stage at a time.
///
/// `Err` is the error type `output()` returns. Every stage's own error must
/// convert into it, and it must be constructible `From<BatonError>` so
/// cancellation and framework failures travel the same path.
pub struct PipelineBuilder<I, O, Err>
where
  I: Send + 'static,
  O: Send + 'static,
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  options: PipelineOptions,
  descriptors: Vec<StageDescriptor>,
  wire: Wire<I, O, Err>,
}

impl<I, O, Err> PipelineBuilder<I, O, Err>
where
  I: Send + 'static,
  O: Send + 'static,
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  /// Starts a chain with its first stage.
  pub fn new<S>(first: S) -> Self
  where
    S: Stage<I, O>,
    S::Error: Into<Err>,
  {
    let descriptors = vec![StageDescriptor::describe(0, &first)];
    Self {
      options: PipelineOptions::default(),
      descriptors,
      wire: wire::<I, O, Err, _>(move |input, wiring| wiring.attach(0, first, input)),
    }
  }

  /// Appends a stage consuming this chain's current output type.
  pub fn then<P, S>(self, next: S) -> PipelineBuilder<I, P, Err>
  where
    P: Send + 'static,
    S: Stage<O, P>,
    S::Error: Into<Err>,
  {
    let index = self.descriptors.len();
    let mut descriptors = self.descriptors;
    descriptors.push(StageDescriptor::describe(index, &next));

    let upstream = self.wire;
    PipelineBuilder {
      options: self.options,
      descriptors,
      wire: wire::<I, P, Err, _>(move |input, wiring| {
        let mid = upstream(input, &mut *wiring);
        wiring.attach(index, next, mid)
      }),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.options.name = name.into();
    self
  }

  pub fn cancel_policy(mut self, policy: CancelPolicy) -> Self {
    self.options.cancel_policy = policy;
    self
  }

  pub fn with_options(mut self, options: PipelineOptions) -> Self {
    self.options = options;
    self
  }

  pub fn stage_count(&self) -> usize {
    self.descriptors.len()
  }

  pub fn descriptors(&self) -> &[StageDescriptor] {
    &self.descriptors
  }

  /// Validates the chain and spawns its workers on the current tokio runtime.
  ///
  /// Fails with `InsufficientStages` for a single-stage chain; no worker is
  /// spawned on any failure.
  pub fn build(self) -> BatonResult<Pipeline<I, O, Err>> {
    self.assemble(None)
  }

  /// As `build`, with every worker observing `token`.
  pub fn build_with_cancel(self, token: CancelToken) -> BatonResult<Pipeline<I, O, Err>> {
    self.assemble(Some(token))
  }

  #[instrument(
    name = "PipelineBuilder::build",
    skip_all,
    fields(
      pipeline = %self.options.name,
      num_stages = self.descriptors.len(),
      cancellable = cancel.is_some(),
    ),
    err(Display)
  )]
  pub(crate) fn assemble(self, cancel: Option<CancelToken>) -> BatonResult<Pipeline<I, O, Err>> {
    let accepts = validation::validate(&self.descriptors)?;

    let count = self.descriptors.len();
    if count < 2 {
      event!(Level::ERROR, count, "Too few stages for a pipeline.");
      return Err(BatonError::InsufficientStages { count });
    }

    let handle = Handle::try_current().map_err(|_| BatonError::RuntimeUnavailable)?;

    let name: Arc<str> = Arc::from(self.options.name.as_str());
    let (errors_tx, errors_rx) = mpsc::channel(count);
    let (input_tx, input_rx) = oneshot::channel();
    let shutdown = CancellationToken::new();
    let board = ProgressBoard::new(&self.descriptors);
    let caller_token = cancel.clone();

    let mut wiring = Wiring {
      pipeline: name.clone(),
      handle,
      errors: errors_tx,
      cancel,
      shutdown: shutdown.clone(),
      policy: self.options.cancel_policy,
      board: board.clone(),
      stage_names: self.descriptors.iter().map(|d| d.name.clone()).collect(),
      workers: JoinSet::new(),
    };
    let output_rx = (self.wire)(input_rx, &mut wiring);

    // Only workers may hold a collector sender, so the collector closes once they are all gone.
    let Wiring { workers, errors, .. } = wiring;
    drop(errors);

    event!(Level::DEBUG, accepts = accepts.name, "Pipeline workers spawned.");

    Ok(Pipeline {
      name,
      descriptors: self.descriptors,
      input: Some(input_tx),
      output: Some(output_rx),
      errors: errors_rx,
      cancel: caller_token,
      workers,
      shutdown,
      board,
    })
  }
}

/// Shared state handed to each stage's wiring step during `build`.
pub(crate) struct Wiring<Err> {
  pipeline: Arc<str>,
  handle: Handle,
  errors: mpsc::Sender<Err>,
  cancel: Option<CancelToken>,
  shutdown: CancellationToken,
  policy: CancelPolicy,
  board: ProgressBoard,
  stage_names: Vec<String>,
  workers: JoinSet<()>,
}

impl<Err> Wiring<Err>
where
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  /// Spawns the worker for stage `index` and returns its output edge.
  fn attach<S, A, B>(&mut self, index: usize, stage: S, input: oneshot::Receiver<A>) -> oneshot::Receiver<B>
  where
    S: Stage<A, B>,
    S::Error: Into<Err>,
    A: Send + 'static,
    B: Send + 'static,
  {
    let (output_tx, output_rx) = oneshot::channel();
    let link = WorkerLink {
      index,
      errors: self.errors.clone(),
      cancel: self.cancel.clone(),
      shutdown: self.shutdown.clone(),
      policy: self.policy,
      board: self.board.clone(),
    };

    let stage_name = self.stage_names.get(index).map_or("<unnamed>", String::as_str);
    let worker_span = span!(
      Level::INFO,
      "pipeline_worker",
      pipeline = %self.pipeline,
      stage_name,
      stage_index = index,
    );

    self
      .workers
      .spawn_on(run_worker(stage, input, output_tx, link).instrument(worker_span), &self.handle);
    output_rx
  }
}
