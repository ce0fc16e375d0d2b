// baton/src/validation.rs

//! Construction-time checks over a chain of stage descriptors.

use crate::core::stage::{StageDescriptor, TypeInfo};
use crate::error::{BatonError, BatonResult};
use tracing::{event, Level};

/// Verifies that every stage accepts what its predecessor produces and
/// returns the input type of the first stage, which becomes the type the
/// pipeline accepts.
///
/// Stage shape (one input, one fallible output) is already fixed by the
/// `Stage` trait, so only adjacency is checked here. The final output type
/// is not checked against anything.
pub fn validate(stages: &[StageDescriptor]) -> BatonResult<TypeInfo> {
  let Some(first) = stages.first() else {
    return Err(BatonError::InsufficientStages { count: 0 });
  };

  let mut expected = first.output;
  for stage in &stages[1..] {
    if stage.input != expected {
      event!(
        Level::ERROR,
        stage_index = stage.index,
        stage_name = %stage.name,
        expected = expected.name,
        found = stage.input.name,
        "Adjacent stage types disagree."
      );
      return Err(BatonError::TypeMismatch {
        stage_index: stage.index,
        stage_name: stage.name.clone(),
        expected: expected.name,
        found: stage.input.name,
      });
    }
    expected = stage.output;
  }

  Ok(first.input)
}
