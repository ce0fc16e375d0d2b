// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use baton::{async_stage, stage, BatonError, Stage};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)] // Clone, PartialEq, Eq for assertions
pub enum TestError {
  #[error("Baton framework error: {0}")]
  Baton(String), // Debug-formatted BatonError, stored as String for Eq comparison

  #[error("Test stage failed: {0}")]
  Stage(String),

  #[error("cancelled")]
  Cancelled,

  #[error("deadline exceeded")]
  DeadlineExceeded,
}

impl From<BatonError> for TestError {
  fn from(err: BatonError) -> Self {
    match err {
      BatonError::Cancelled => TestError::Cancelled,
      BatonError::DeadlineExceeded => TestError::DeadlineExceeded,
      other => TestError::Baton(format!("{:?}", other)),
    }
  }
}

impl From<std::num::ParseIntError> for TestError {
  fn from(err: std::num::ParseIntError) -> Self {
    TestError::Stage(err.to_string())
  }
}

// --- Common Stage Creators ---

/// `s ↦ s + s`
pub fn concat_stage() -> impl Stage<String, String, Error = TestError> {
  stage("concat", |s: String| Ok::<_, TestError>(format!("{s}{s}")))
}

/// `s ↦ parse(s)`
pub fn parse_stage() -> impl Stage<String, i64, Error = TestError> {
  stage("parse", |s: String| s.parse::<i64>().map_err(TestError::from))
}

/// `n ↦ n * n`
pub fn square_stage() -> impl Stage<i64, i64, Error = TestError> {
  stage("square", |n: i64| Ok::<_, TestError>(n * n))
}

/// Identity on `i64` that counts its invocations.
pub fn counting_stage(name: &'static str, counter: Arc<AtomicUsize>) -> impl Stage<i64, i64, Error = TestError> {
  stage(name, move |n: i64| {
    counter.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(target: "test_stages", stage = name, "executed with {}", n);
    Ok::<_, TestError>(n)
  })
}

pub fn failing_stage(name: &'static str, error_message: &'static str) -> impl Stage<i64, i64, Error = TestError> {
  stage(name, move |_n: i64| {
    tracing::warn!(target: "test_stages", stage = name, "failing with: '{}'", error_message);
    Err::<i64, _>(TestError::Stage(error_message.to_string()))
  })
}

/// Identity on `i64` that sleeps before answering.
pub fn slow_stage(name: &'static str, delay: Duration) -> impl Stage<i64, i64, Error = TestError> {
  async_stage(name, move |n: i64| async move {
    tokio::time::sleep(delay).await;
    Ok::<_, TestError>(n)
  })
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Atomic counters for checking execution counts ---
pub static STAGE_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counter(counter: &AtomicUsize) {
  counter.store(0, Ordering::SeqCst);
}
