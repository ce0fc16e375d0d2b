// baton/src/dynamic.rs

//! Runtime-typed pipelines for chains assembled at runtime.
//!
//! A `DynStage` erases a `Stage<I, O>` over boxed `Any` values but keeps
//! the real input and output types, so the validator can still reject a
//! mismatched chain before any worker starts, and `DynPipeline::input`
//! can reject a wrongly typed initial value.

use crate::core::cancel::{CancelPolicy, CancelToken};
use crate::core::report::StageReport;
use crate::core::stage::{Stage, StageDescriptor, TypeInfo};
use crate::error::{BatonError, BatonResult};
use crate::pipeline::{Pipeline, PipelineBuilder, PipelineOptions};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use tracing::{event, Level};

/// A value travelling through a dynamic pipeline.
pub type AnyValue = Box<dyn Any + Send>;

#[async_trait]
trait ErasedStage<Err>: Send + Sync {
  async fn process_any(&self, input: AnyValue) -> Result<AnyValue, Err>;
}

struct Erased<S, I, O> {
  stage: S,
  _marker: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<S, I, O, Err> ErasedStage<Err> for Erased<S, I, O>
where
  S: Stage<I, O>,
  S::Error: Into<Err>,
  I: Send + 'static,
  O: Send + 'static,
  Err: From<BatonError> + Send + 'static,
{
  async fn process_any(&self, input: AnyValue) -> Result<AnyValue, Err> {
    // Validation guarantees the upstream type, so a failed downcast is a bug.
    let typed = input.downcast::<I>().map_err(|_| {
      Err::from(BatonError::Internal(format!(
        "stage '{}' received a value that is not {}",
        self.stage.name(),
        std::any::type_name::<I>()
      )))
    })?;
    let out = self.stage.process(*typed).await.map_err(Into::into)?;
    Ok(Box::new(out) as AnyValue)
  }
}

/// A type-erased stage that remembers the types it really works on.
pub struct DynStage<Err> {
  name: String,
  input: TypeInfo,
  output: TypeInfo,
  inner: Box<dyn ErasedStage<Err>>,
}

impl<Err> DynStage<Err>
where
  Err: From<BatonError> + Send + 'static,
{
  pub fn new<S, I, O>(stage: S) -> Self
  where
    S: Stage<I, O>,
    S::Error: Into<Err>,
    I: Send + 'static,
    O: Send + 'static,
  {
    Self {
      name: stage.name().to_string(),
      input: stage.input_type(),
      output: stage.output_type(),
      inner: Box::new(Erased {
        stage,
        _marker: PhantomData,
      }),
    }
  }
}

impl<Err> std::fmt::Debug for DynStage<Err> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DynStage")
      .field("name", &self.name)
      .field("input", &self.input)
      .field("output", &self.output)
      .finish()
  }
}

#[async_trait]
impl<Err> Stage<AnyValue, AnyValue> for DynStage<Err>
where
  Err: Send + 'static,
{
  type Error = Err;

  async fn process(&self, input: AnyValue) -> Result<AnyValue, Err> {
    self.inner.process_any(input).await
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn input_type(&self) -> TypeInfo {
    self.input
  }

  fn output_type(&self) -> TypeInfo {
    self.output
  }
}

/// Collects `DynStage`s and builds a `DynPipeline` from them.
pub struct DynPipelineBuilder<Err> {
  stages: Vec<DynStage<Err>>,
  options: PipelineOptions,
}

impl<Err> Default for DynPipelineBuilder<Err> {
  fn default() -> Self {
    Self {
      stages: Vec::new(),
      options: PipelineOptions::default(),
    }
  }
}

impl<Err> DynPipelineBuilder<Err>
where
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_stages(stages: impl IntoIterator<Item = DynStage<Err>>) -> Self {
    Self {
      stages: stages.into_iter().collect(),
      options: PipelineOptions::default(),
    }
  }

  /// Appends a typed stage, erasing it.
  pub fn stage<S, I, O>(self, stage: S) -> Self
  where
    S: Stage<I, O>,
    S::Error: Into<Err>,
    I: Send + 'static,
    O: Send + 'static,
  {
    self.push(DynStage::new(stage))
  }

  pub fn push(mut self, stage: DynStage<Err>) -> Self {
    self.stages.push(stage);
    self
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

  /// Validates stage types pairwise, checks the stage count, spawns workers.
  pub fn build(self) -> BatonResult<DynPipeline<Err>> {
    self.assemble(None)
  }

  pub fn build_with_cancel(self, token: CancelToken) -> BatonResult<DynPipeline<Err>> {
    self.assemble(Some(token))
  }

  fn assemble(self, cancel: Option<CancelToken>) -> BatonResult<DynPipeline<Err>> {
    let mut stages = self.stages.into_iter();
    let Some(first) = stages.next() else {
      event!(Level::ERROR, "Dynamic pipeline has no stages.");
      return Err(BatonError::InsufficientStages { count: 0 });
    };

    let accepts = first.input;
    let mut yields = first.output;
    let mut builder = PipelineBuilder::<AnyValue, AnyValue, Err>::new(first).with_options(self.options);
    for stage in stages {
      yields = stage.output;
      builder = builder.then(stage);
    }

    // The typed builder validates the real types recorded on each DynStage.
    let inner = builder.assemble(cancel)?;
    Ok(DynPipeline { inner, accepts, yields })
  }
}

/// A running pipeline over type-erased values.
///
/// The accepted input type is checked at `input`, and `output_as` checks
/// the produced value, so a type error is returned rather than panicking.
pub struct DynPipeline<Err>
where
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  inner: Pipeline<AnyValue, AnyValue, Err>,
  accepts: TypeInfo,
  yields: TypeInfo,
}

impl<Err> DynPipeline<Err>
where
  Err: std::error::Error + From<BatonError> + Send + Sync + 'static,
{
  /// The type the first stage declared as its input.
  pub fn input_type(&self) -> TypeInfo {
    self.accepts
  }

  /// The type the last stage declared as its output.
  pub fn output_type(&self) -> TypeInfo {
    self.yields
  }

  pub fn stage_count(&self) -> usize {
    self.inner.stage_count()
  }

  pub fn descriptors(&self) -> &[StageDescriptor] {
    self.inner.descriptors()
  }

  pub fn input<T: Any + Send>(&mut self, value: T) -> BatonResult<()> {
    if TypeId::of::<T>() != self.accepts.id {
      event!(
        Level::ERROR,
        expected = self.accepts.name,
        found = std::any::type_name::<T>(),
        "Dynamic pipeline input has the wrong type."
      );
      return Err(BatonError::InputTypeMismatch {
        expected: self.accepts.name,
        found: std::any::type_name::<T>(),
      });
    }
    self.inner.input(Box::new(value))
  }

  /// The final value, still boxed.
  pub async fn output(&mut self) -> Result<AnyValue, Err> {
    self.inner.output().await
  }

  /// The final value downcast to `T`.
  pub async fn output_as<T: Any>(&mut self) -> Result<T, Err> {
    let value = self.inner.output().await?;
    value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
      Err::from(BatonError::OutputTypeMismatch {
        expected: std::any::type_name::<T>(),
        found: self.yields.name,
      })
    })
  }

  pub async fn run<T: Any + Send, R: Any>(&mut self, value: T) -> Result<R, Err> {
    self.input(value).map_err(Err::from)?;
    self.output_as::<R>().await
  }

  pub fn drain_errors(&mut self) -> Vec<Err> {
    self.inner.drain_errors()
  }

  pub fn progress(&self) -> Vec<StageReport> {
    self.inner.progress()
  }

  pub async fn shutdown(self) {
    self.inner.shutdown().await
  }
}
