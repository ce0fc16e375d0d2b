// src/lib.rs

//! Baton: a type-checked relay pipeline executor for Rust.
//!
//! Baton wires an ordered chain of single-input / single-output stages into
//! concurrently running tokio tasks, hands the initial value to the first
//! one and gives back the last stage's output, or the first error raised
//! anywhere along the chain. Features:
//!  - Compile-time checked chains: `PipelineBuilder::new(a).then(b).then(c)`.
//!  - Runtime-assembled, heterogeneous chains with validated types (`DynPipelineBuilder`).
//!  - One worker per stage, one-shot hand-off between neighbours.
//!  - Cooperative cancellation and deadlines through a shared `CancelToken`.
//!  - Structured shutdown: workers never outlive their pipeline.
//!  - Per-stage progress reports.

pub mod core;
pub mod dynamic;
pub mod error;
pub mod pipeline;
pub mod validation;

// --- Re-exports for the Public API ---

pub use crate::core::cancel::{CancelPolicy, CancelToken};
pub use crate::core::report::{StageReport, StageState};
pub use crate::core::stage::{
  async_stage, compose, stage, AsyncFnStage, Composed, FnStage, Stage, StageDescriptor, StageExt, TypeInfo,
};

pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineOptions};

pub use crate::dynamic::{AnyValue, DynPipeline, DynPipelineBuilder, DynStage};

pub use crate::error::{BatonError, BatonResult};

pub use crate::validation::validate;

/*
    Core flow:
    1. Write stages as closures (`stage`, `async_stage`) or `Stage<I, O>` impls.
    2. Chain them: `PipelineBuilder::<In, _, MyErr>::new(first).then(second)...`.
       `MyErr` must implement `From<BatonError>`, and every stage error must convert into it.
    3. `build()` or `build_with_cancel(token)` inside a tokio runtime.
    4. `pipeline.input(value)?` then `pipeline.output().await`, or `pipeline.run(value).await`.
    5. Drop the pipeline or `shutdown().await` it; build a new one for the next run.
*/
