// baton/src/core/stage.rs

//! Defines the `Stage<I, O>` trait, the closure adapters that implement it,
//! and the descriptor the validator and the tracing spans work from.

use async_trait::async_trait;
use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A single-input, single-output transform with a fallible result.
///
/// The signature fixes the stage's shape: exactly one input of type `I`,
/// exactly one output of type `O` or a `Self::Error`. Stages are never
/// mutated by the engine, only invoked through `&self`.
#[async_trait]
pub trait Stage<I: Send + 'static, O: Send + 'static>: Send + Sync + 'static {
  /// The stage's own failure type. It must convert into the pipeline's error type.
  type Error: Send + 'static;

  /// Transform one input into one output.
  async fn process(&self, input: I) -> Result<O, Self::Error>;

  /// Human-readable name of this stage (for errors and tracing).
  fn name(&self) -> &str {
    std::any::type_name::<Self>()
  }

  /// The type this stage declares as its input.
  ///
  /// Type-erased stages override this to report the type they really accept.
  fn input_type(&self) -> TypeInfo {
    TypeInfo::of::<I>()
  }

  /// The type this stage declares as its output.
  fn output_type(&self) -> TypeInfo {
    TypeInfo::of::<O>()
  }
}

/// Identity and printable name of a Rust type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
  pub id: TypeId,
  pub name: &'static str,
}

impl TypeInfo {
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }
}

// Names are for display only; two TypeInfos are equal when their TypeIds are.
impl PartialEq for TypeInfo {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// What the builder records about each stage before any worker runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
  pub index: usize,
  pub name: String,
  pub input: TypeInfo,
  pub output: TypeInfo,
}

impl StageDescriptor {
  pub fn describe<S, I, O>(index: usize, stage: &S) -> Self
  where
    S: Stage<I, O> + ?Sized,
    I: Send + 'static,
    O: Send + 'static,
  {
    Self {
      index,
      name: stage.name().to_string(),
      input: stage.input_type(),
      output: stage.output_type(),
    }
  }
}

// --- Closure adapters ---

/// A stage backed by a synchronous closure `Fn(I) -> Result<O, E>`.
pub struct FnStage<F, I, O, E> {
  name: String,
  f: F,
  _marker: PhantomData<fn(I) -> Result<O, E>>,
}

/// Wraps a synchronous closure as a named stage.
///
/// ```ignore
/// let parse = baton::stage("parse", |s: String| s.parse::<i64>());
/// ```
pub fn stage<F, I, O, E>(name: impl Into<String>, f: F) -> FnStage<F, I, O, E>
where
  F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
{
  FnStage {
    name: name.into(),
    f,
    _marker: PhantomData,
  }
}

#[async_trait]
impl<F, I, O, E> Stage<I, O> for FnStage<F, I, O, E>
where
  F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
  I: Send + 'static,
  O: Send + 'static,
  E: Send + 'static,
{
  type Error = E;

  async fn process(&self, input: I) -> Result<O, E> {
    (self.f)(input)
  }

  fn name(&self) -> &str {
    &self.name
  }
}

/// A stage backed by an asynchronous closure `Fn(I) -> impl Future<Output = Result<O, E>>`.
pub struct AsyncFnStage<F, Fut, I, O, E> {
  name: String,
  f: F,
  _marker: PhantomData<fn(I) -> (Fut, O, E)>,
}

/// Wraps an asynchronous closure as a named stage. Use this for stages that
/// perform I/O or sleep, so they don't hold a runtime thread.
pub fn async_stage<F, Fut, I, O, E>(name: impl Into<String>, f: F) -> AsyncFnStage<F, Fut, I, O, E>
where
  F: Fn(I) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<O, E>> + Send + 'static,
{
  AsyncFnStage {
    name: name.into(),
    f,
    _marker: PhantomData,
  }
}

#[async_trait]
impl<F, Fut, I, O, E> Stage<I, O> for AsyncFnStage<F, Fut, I, O, E>
where
  F: Fn(I) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<O, E>> + Send + 'static,
  I: Send + 'static,
  O: Send + 'static,
  E: Send + 'static,
{
  type Error = E;

  async fn process(&self, input: I) -> Result<O, E> {
    (self.f)(input).await
  }

  fn name(&self) -> &str {
    &self.name
  }
}

// --- Forwarding impls so stages can be shared or boxed ---

#[async_trait]
impl<S, I, O> Stage<I, O> for Arc<S>
where
  S: Stage<I, O> + ?Sized,
  I: Send + 'static,
  O: Send + 'static,
{
  type Error = S::Error;

  async fn process(&self, input: I) -> Result<O, S::Error> {
    self.as_ref().process(input).await
  }

  fn name(&self) -> &str {
    self.as_ref().name()
  }

  fn input_type(&self) -> TypeInfo {
    self.as_ref().input_type()
  }

  fn output_type(&self) -> TypeInfo {
    self.as_ref().output_type()
  }
}

#[async_trait]
impl<S, I, O> Stage<I, O> for Box<S>
where
  S: Stage<I, O> + ?Sized,
  I: Send + 'static,
  O: Send + 'static,
{
  type Error = S::Error;

  async fn process(&self, input: I) -> Result<O, S::Error> {
    self.as_ref().process(input).await
  }

  fn name(&self) -> &str {
    self.as_ref().name()
  }

  fn input_type(&self) -> TypeInfo {
    self.as_ref().input_type()
  }

  fn output_type(&self) -> TypeInfo {
    self.as_ref().output_type()
  }
}

// --- Two-stage composition ---

/// Two stages fused into one: `A: I -> M` followed by `B: M -> O`.
///
/// Runs both in the same task, so it counts as a single stage when handed
/// to a pipeline builder.
pub struct Composed<A, B, M> {
  first: A,
  second: B,
  name: String,
  _mid: PhantomData<fn() -> M>,
}

/// Composes `first` and `second` into a single `Stage<I, O>`.
/// A chain whose middle types disagree does not compile.
pub fn compose<A, B, I, M, O>(first: A, second: B) -> Composed<A, B, M>
where
  A: Stage<I, M>,
  B: Stage<M, O>,
  B::Error: Into<A::Error>,
  I: Send + 'static,
  M: Send + 'static,
  O: Send + 'static,
{
  let name = format!("{} -> {}", first.name(), second.name());
  Composed {
    first,
    second,
    name,
    _mid: PhantomData,
  }
}

#[async_trait]
impl<A, B, I, M, O> Stage<I, O> for Composed<A, B, M>
where
  A: Stage<I, M>,
  B: Stage<M, O>,
  B::Error: Into<A::Error>,
  I: Send + 'static,
  M: Send + 'static,
  O: Send + 'static,
{
  type Error = A::Error;

  async fn process(&self, input: I) -> Result<O, A::Error> {
    let mid = self.first.process(input).await?;
    self.second.process(mid).await.map_err(Into::into)
  }

  fn name(&self) -> &str {
    &self.name
  }
}

/// Method-call sugar for [`compose`].
pub trait StageExt<I: Send + 'static, M: Send + 'static>: Stage<I, M> + Sized {
  fn and_then<B, O>(self, next: B) -> Composed<Self, B, M>
  where
    B: Stage<M, O>,
    B::Error: Into<Self::Error>,
    O: Send + 'static,
  {
    compose(self, next)
  }
}

impl<S, I, M> StageExt<I, M> for S
where
  S: Stage<I, M>,
  I: Send + 'static,
  M: Send + 'static,
{
}
