// baton/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatonError {
  /// A chain needs at least two stages; a single stage is just a function call.
  #[error("Pipeline needs at least 2 stages (got {count})")]
  InsufficientStages { count: usize },

  #[error("Type mismatch at stage {stage_index} ('{stage_name}'): expected input {expected}, found {found}")]
  TypeMismatch {
    stage_index: usize,
    stage_name: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error("Pipeline input type mismatch: expected {expected}, found {found}")]
  InputTypeMismatch { expected: &'static str, found: &'static str },

  #[error("Pipeline output type mismatch: expected {expected}, found {found}")]
  OutputTypeMismatch { expected: &'static str, found: &'static str },

  #[error("Pipeline cancelled")]
  Cancelled,

  #[error("Pipeline deadline exceeded")]
  DeadlineExceeded,

  /// `input` and `output` are single-use per pipeline instance.
  #[error("Pipeline {operation} already consumed; build a new pipeline per run")]
  AlreadyConsumed { operation: &'static str },

  #[error("A pipeline worker terminated without producing a value or an error")]
  WorkerLost,

  #[error("No tokio runtime available to spawn pipeline workers")]
  RuntimeUnavailable,

  #[error("Stage '{stage_name}' failed. Source: {source}")]
  StageFailure {
    stage_name: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Internal baton error: {0}")]
  Internal(String),
}

/// Placeholder stage name for failures converted before their stage is known.
pub(crate) const UNKNOWN_STAGE: &str = "<unknown>";

impl BatonError {
  /// True for errors raised by a cancel token rather than by a stage.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, BatonError::Cancelled | BatonError::DeadlineExceeded)
  }

  /// True for errors that describe an invalid pipeline topology.
  pub fn is_construction(&self) -> bool {
    matches!(
      self,
      BatonError::InsufficientStages { .. } | BatonError::TypeMismatch { .. } | BatonError::RuntimeUnavailable
    )
  }

  /// Names the stage behind a `StageFailure` that doesn't carry one yet.
  pub(crate) fn attribute_to(&mut self, stage: &str) {
    if let BatonError::StageFailure { stage_name, .. } = self {
      if stage_name == UNKNOWN_STAGE {
        *stage_name = stage.to_string();
      }
    }
  }
}

impl From<AnyhowError> for BatonError {
  fn from(err: AnyhowError) -> Self {
    // Don't nest a BatonError that already made the trip through anyhow.
    match err.downcast::<BatonError>() {
      Ok(baton_err) => baton_err,
      Err(err) => BatonError::StageFailure {
        stage_name: String::from(UNKNOWN_STAGE),
        source: err,
      },
    }
  }
}

pub type BatonResult<T, E = BatonError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn anyhow_roundtrip_does_not_nest() {
    let wrapped = AnyhowError::new(BatonError::DeadlineExceeded);
    assert!(matches!(BatonError::from(wrapped), BatonError::DeadlineExceeded));
  }

  #[test]
  fn plain_anyhow_becomes_stage_failure() {
    let err = BatonError::from(anyhow::anyhow!("boom"));
    match err {
      BatonError::StageFailure { source, .. } => assert_eq!(source.to_string(), "boom"),
      other => panic!("Expected StageFailure, got {:?}", other),
    }
  }

  #[test]
  fn attribution_fills_only_unknown_stage_names() {
    let mut err = BatonError::from(anyhow::anyhow!("boom"));
    err.attribute_to("parse");
    err.attribute_to("later");
    assert!(matches!(err, BatonError::StageFailure { ref stage_name, .. } if stage_name == "parse"));

    let mut other = BatonError::Cancelled;
    other.attribute_to("parse");
    assert!(matches!(other, BatonError::Cancelled));
  }

  #[test]
  fn classification() {
    assert!(BatonError::Cancelled.is_cancellation());
    assert!(BatonError::InsufficientStages { count: 1 }.is_construction());
    assert!(!BatonError::WorkerLost.is_construction());
  }
}
