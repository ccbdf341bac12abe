// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so cron evaluation and timed waits can be tested
//! without sleeping real time.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of the current instant, both as wall-clock milliseconds and
/// as a monotonic `Instant`.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// A monotonic instant, used for scheduling sleeps/timeouts.
    fn now_instant(&self) -> Instant;
}

/// Production clock backed by `SystemTime`/`Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that only advances when told to.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

#[derive(Debug)]
struct FakeClockState {
    millis: i64,
    instant: Instant,
}

impl FakeClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                millis: start_millis,
                instant: Instant::now(),
            })),
        }
    }

    /// Advance the fake clock by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: i64) {
        let mut state = self.inner.lock();
        state.millis += delta_ms;
        state.instant += std::time::Duration::from_millis(delta_ms.max(0) as u64);
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> i64 {
        self.inner.lock().millis
    }

    fn now_instant(&self) -> Instant {
        self.inner.lock().instant
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
