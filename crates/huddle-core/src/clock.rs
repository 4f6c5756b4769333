//! Wall-clock abstraction.
//!
//! Timestamps are truncated to microseconds so a value read back from storage
//! compares equal to the one that was written.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SubsecRound, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }
}

/// A clock that only moves when told to. Cloning shares the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { now: Arc::new(Mutex::new(start.trunc_subsecs(6))) }
  }

  pub fn set(&self, at: DateTime<Utc>) {
    let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *guard = at.trunc_subsecs(6);
  }

  pub fn advance(&self, by: Duration) {
    let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *guard += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|p| p.into_inner())
  }
}
