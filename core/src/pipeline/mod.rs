// baton/src/pipeline/mod.rs

//! Defines the `Pipeline<I, O, Err>` handle, its typed builder, and the
//! per-stage worker that drives it.

pub mod builder;
pub mod engine;
pub(crate) mod worker;

pub use builder::{PipelineBuilder, PipelineOptions};
pub use engine::Pipeline;
