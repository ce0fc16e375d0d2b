pub mod cancel;
pub mod report;
pub mod stage;

// Re-export key types for easier access from other baton modules (and lib.rs)
pub use cancel::{CancelPolicy, CancelToken};
pub use report::{StageReport, StageState};
pub use stage::{async_stage, compose, stage, AsyncFnStage, Composed, FnStage, Stage, StageDescriptor, StageExt, TypeInfo};
