// baton/src/core/cancel.rs

//! Cooperative cancellation for pipeline runs.
//!
//! A `CancelToken` is a cheap, cloneable handle around a tokio-util
//! `CancellationToken` plus an optional deadline. Every clone observes the
//! same signal, so the caller keeps one clone and hands another to the
//! pipeline builder.

use crate::error::{BatonError, BatonResult};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  inner: CancellationToken,
  deadline: Option<Instant>,
  // Set once by the first `cancel()`, so a later deadline doesn't rewrite the reason.
  cancelled_at: Arc<OnceLock<Instant>>,
}

impl CancelToken {
  /// A token that only fires when `cancel()` is called.
  pub fn new() -> Self {
    Self::default()
  }

  /// A token that fires `timeout` from now, or earlier on `cancel()`.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self::with_deadline(Instant::now() + timeout)
  }

  /// A token that fires at `deadline`, or earlier on `cancel()`.
  pub fn with_deadline(deadline: Instant) -> Self {
    Self {
      deadline: Some(deadline),
      ..Self::default()
    }
  }

  /// A token that fires with this one, but can also be cancelled on its own
  /// without affecting the parent. It inherits the parent's deadline.
  pub fn child(&self) -> Self {
    Self {
      inner: self.inner.child_token(),
      deadline: self.deadline,
      cancelled_at: Arc::new(OnceLock::new()),
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Fires the token for every clone.
  pub fn cancel(&self) {
    let _ = self.cancelled_at.set(Instant::now());
    self.inner.cancel();
  }

  /// Why the token has fired, or `None` while it hasn't.
  pub fn reason(&self) -> Option<BatonError> {
    let deadline_passed = self.deadline.map_or(false, |d| Instant::now() >= d);

    match (self.cancelled_at.get(), self.deadline) {
      (Some(at), Some(deadline)) if *at >= deadline => Some(BatonError::DeadlineExceeded),
      (Some(_), _) => Some(BatonError::Cancelled),
      (None, _) if deadline_passed => Some(BatonError::DeadlineExceeded),
      (None, _) if self.inner.is_cancelled() => Some(BatonError::Cancelled),
      _ => None,
    }
  }

  pub fn is_triggered(&self) -> bool {
    self.reason().is_some()
  }

  /// `Ok(())` while live, the cancellation error once fired.
  pub fn check(&self) -> BatonResult<()> {
    match self.reason() {
      Some(reason) => Err(reason),
      None => Ok(()),
    }
  }

  /// Resolves once the token fires, yielding the reason.
  pub async fn triggered(&self) -> BatonError {
    match self.deadline {
      Some(deadline) => {
        tokio::select! {
          _ = self.inner.cancelled() => self.reason().unwrap_or(BatonError::Cancelled),
          _ = tokio::time::sleep_until(deadline) => self.reason().unwrap_or(BatonError::DeadlineExceeded),
        }
      }
      None => {
        self.inner.cancelled().await;
        BatonError::Cancelled
      }
    }
  }
}

/// Waits on an optional token; never resolves when there is none.
pub(crate) async fn wait_triggered(token: Option<&CancelToken>) -> BatonError {
  match token {
    Some(token) => token.triggered().await,
    None => std::future::pending().await,
  }
}

/// Where workers look at the cancel token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
  /// Checked while waiting for input and once more right before the stage
  /// is invoked. A stage that has started runs to completion.
  #[default]
  BetweenStages,
  /// As `BetweenStages`, and additionally the running stage is raced
  /// against the token and dropped if the token fires first.
  Preemptive,
}
