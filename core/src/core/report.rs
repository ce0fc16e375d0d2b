// baton/src/core/report.rs

//! Per-stage progress tracking for a running pipeline.

use crate::core::stage::StageDescriptor;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of one stage's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
  /// Spawned, waiting for its input.
  Pending,
  /// The stage is executing.
  Running,
  /// The output was handed downstream.
  Completed,
  /// The stage returned an error.
  Failed,
  /// The cancel token fired before or while the stage ran.
  Cancelled,
  /// The worker exited without running: upstream closed or the pipeline shut down.
  Abandoned,
}

impl StageState {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, StageState::Pending | StageState::Running)
  }
}

#[derive(Debug, Clone)]
pub struct StageReport {
  pub index: usize,
  pub name: String,
  pub state: StageState,
  /// Time spent inside the stage; `None` until it has started.
  pub elapsed: Option<Duration>,
}

#[derive(Debug)]
struct Slot {
  report: StageReport,
  started: Option<Instant>,
}

/// Shared board with one slot per stage. Each worker writes only its own slot.
///
/// Guards are held only for the duration of a single update and never across `.await`.
#[derive(Debug, Clone)]
pub(crate) struct ProgressBoard(Arc<RwLock<Vec<Slot>>>);

impl ProgressBoard {
  pub(crate) fn new(descriptors: &[StageDescriptor]) -> Self {
    let slots = descriptors
      .iter()
      .map(|d| Slot {
        report: StageReport {
          index: d.index,
          name: d.name.clone(),
          state: StageState::Pending,
          elapsed: None,
        },
        started: None,
      })
      .collect();
    ProgressBoard(Arc::new(RwLock::new(slots)))
  }

  pub(crate) fn start(&self, index: usize) {
    if let Some(slot) = self.0.write().get_mut(index) {
      slot.started = Some(Instant::now());
      slot.report.state = StageState::Running;
    }
  }

  pub(crate) fn finish(&self, index: usize, state: StageState) {
    if let Some(slot) = self.0.write().get_mut(index) {
      slot.report.elapsed = slot.started.map(|at| at.elapsed());
      slot.report.state = state;
    }
  }

  pub(crate) fn snapshot(&self) -> Vec<StageReport> {
    self.0.read().iter().map(|slot| slot.report.clone()).collect()
  }
}
