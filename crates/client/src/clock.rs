//! Time source for staleness checks.
//!
//! Staleness is measured in wall-clock time so that time the host spent
//! suspended counts as silence. A monotonic clock stops while the machine
//! sleeps, which would hide exactly the dead connections the wake check
//! exists to catch.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;

use jobwatch_core::types::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Time elapsed from `since` to `now`. A clock that jumped backwards
/// yields zero.
pub fn elapsed_between(since: Timestamp, now: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

/// UTC wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(at: Timestamp) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::milliseconds(by.as_millis().min(i64::MAX as u128) as i64);
        *self.lock() += step;
    }

    /// Move the clock back, as an NTP correction or a manual change would.
    pub fn rewind(&self, by: Duration) {
        let step = chrono::Duration::milliseconds(by.as_millis().min(i64::MAX as u128) as i64);
        *self.lock() -= step;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timestamp> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.lock()
    }
}
