//! Mock clock for testing.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;

use crate::clock::Clock;

/// A clock that follows tokio's timer from a fixed starting instant.
///
/// Under `#[tokio::test(start_paused = true)]` simulated time drives the
/// wall clock, so deadlines minutes away pass instantly. The clock can also
/// be stepped to simulate wall-clock adjustments.
#[derive(Debug)]
pub struct MockClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
    offset: Mutex<TimeDelta>,
}

impl MockClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
            offset: Mutex::new(TimeDelta::zero()),
        }
    }

    /// Step the clock forward without advancing tokio time.
    pub fn advance(&self, by: TimeDelta) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset = *offset + by;
    }

    /// Step the clock backwards without advancing tokio time.
    pub fn rewind(&self, by: TimeDelta) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset = *offset - by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::zero());
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.base + elapsed + offset
    }
}
