// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duty-cycle shutdown sequence (spec §4.E): drain jobs, wait for the
//! transfer backlog to quiesce, re-check the schedule, hand wake-up
//! scheduling to the TOS node, then hand off process exit. Every stage
//! is cancellable by a concurrent [`ShutdownOrchestrator::stop`].

use crate::error::ShutdownError;
use crate::ports::{BusySignal, JobsObserver, TosControl};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

/// How often [`ShutdownOrchestrator`] re-polls [`BusySignal::is_busy`]
/// while waiting for the transfer backlog to quiesce.
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Timing inputs for one shutdown attempt, computed by the caller from
/// live config/schedule/uptime state.
pub struct ShutdownRequest {
    /// Remainder of the current service window, if one is in progress
    /// (stage 1).
    pub service_window_delay: Option<Duration>,
    /// Bound on stage 2's job-drain wait; `None` waits indefinitely.
    pub max_job_runtime: Option<Duration>,
    /// Bound on stage 4's resend-drain wait: `max_db_resend_runtime -
    /// agent_uptime`, already clamped non-negative by the caller.
    pub resend_budget: Duration,
    /// Seconds to the next service window to report at stage 6, or
    /// `None` if service wake-ups are disabled (`SERVICE_WINDOW` with
    /// argument `0xFFFFFFFF`).
    pub next_service_window_seconds: Option<u32>,
    /// Offset, in seconds, at which the node should hard cut power.
    pub hard_shutdown_offset_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Ran to completion: `SHUTDOWN` was sent and exit was signalled.
    Completed,
    /// Stage 5 found a job due sooner than `max_next_schedule_wait_delta`.
    AbortedScheduleImminent,
    /// Stage 7 found the node had entered BEACON.
    AbortedBeacon,
    /// A concurrent `stop()` cancelled the sequence before completion.
    Cancelled,
}

/// Duty-cycle shutdown, generic over the jobs-observer port; the busy
/// signal and TOS control are type-erased (`Arc<dyn _>`) so this struct
/// doesn't also need to carry the transfer channel's and TOS
/// transport's own generic parameters — see `ports.rs`.
pub struct ShutdownOrchestrator<J: JobsObserver> {
    jobs: Arc<J>,
    busy: Arc<dyn BusySignal>,
    tos: Arc<dyn TosControl>,
    exit_signal: Mutex<Option<oneshot::Sender<()>>>,
    stopped: AtomicBool,
    stop_notify: Notify,
}

impl<J: JobsObserver> ShutdownOrchestrator<J> {
    pub fn new(
        jobs: Arc<J>,
        busy: Arc<dyn BusySignal>,
        tos: Arc<dyn TosControl>,
        exit_signal: oneshot::Sender<()>,
    ) -> Self {
        Self {
            jobs,
            busy,
            tos,
            exit_signal: Mutex::new(Some(exit_signal)),
            stopped: AtomicBool::new(false),
            stop_notify: Notify::new(),
        }
    }

    /// Cancel an in-progress (or not-yet-started) shutdown sequence.
    /// Every wait in [`Self::run`] re-checks this flag on return,
    /// guaranteeing it returns promptly.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run the staged sequence once. `reevaluate` is called at stage 5
    /// to re-check whether a job is now due sooner than
    /// `max_next_schedule_wait_delta`; it is injected rather than this
    /// struct depending directly on `bl_cron`/the live schedule.
    pub async fn run(
        &self,
        req: ShutdownRequest,
        reevaluate: impl Fn() -> bool,
    ) -> Result<ShutdownOutcome, ShutdownError> {
        info!("shutdown sequence starting");

        // 1. Sleep out any in-progress service window.
        if let Some(delay) = req.service_window_delay {
            if self.cancellable_sleep(delay).await {
                return Ok(ShutdownOutcome::Cancelled);
            }
        }

        // 2. Drain running jobs, bounded by the longest remaining
        // runtime among them.
        if !self.wait_jobs_finished(req.max_job_runtime).await {
            return Ok(ShutdownOutcome::Cancelled);
        }

        // 3. Wait for the transfer backlog to quiesce, unbounded — the
        // original waits on `waitForGSNFinished` with no timeout.
        if !self.wait_busy_cleared(None).await {
            return Ok(ShutdownOutcome::Cancelled);
        }

        // 4. Same signal, now bounded by the resend budget: the
        // original's `resendFinished` is set at the same point in the
        // backlog loop as `waitForGSNFinished` (see DESIGN.md), just
        // waited on with a budget instead of indefinitely.
        if !self.wait_busy_cleared(Some(req.resend_budget)).await {
            return Ok(ShutdownOutcome::Cancelled);
        }

        // 5. Re-check the schedule.
        if self.is_stopped() {
            return Ok(ShutdownOutcome::Cancelled);
        }
        if reevaluate() {
            info!("next schedule is coming soon, aborting shutdown");
            return Ok(ShutdownOutcome::AbortedScheduleImminent);
        }

        // 6. Tell the node when to expect us next.
        self.tos
            .service_window(req.next_service_window_seconds)
            .await;

        // 7. Re-query wake-up state; BEACON aborts.
        self.tos.wakeup_query().await;
        if self.is_stopped() {
            return Ok(ShutdownOutcome::Cancelled);
        }
        if self.tos.is_beacon_active() {
            info!("node entered BEACON during shutdown, aborting");
            return Ok(ShutdownOutcome::AbortedBeacon);
        }

        // 8. Stop the ping thread, arm the hard shutdown, signal exit.
        self.tos.stop_ping();
        self.tos.shutdown(req.hard_shutdown_offset_seconds).await;
        info!(
            offset_seconds = req.hard_shutdown_offset_seconds,
            "hard shutdown armed on node, signalling process exit"
        );
        let tx = self.exit_signal.lock().take();
        match tx {
            Some(tx) => tx.send(()).map_err(|_| ShutdownError::ExitSignalDropped)?,
            None => return Err(ShutdownError::ExitSignalDropped),
        }

        Ok(ShutdownOutcome::Completed)
    }

    /// Sleep for `dur`; returns `true` if `stop()` fired first.
    async fn cancellable_sleep(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(dur) => false,
            _ = self.stop_notify.notified() => true,
        }
    }

    /// Wait for the jobs observer to report all jobs finished. Returns
    /// `false` if cancelled.
    async fn wait_jobs_finished(&self, bound: Option<Duration>) -> bool {
        tokio::select! {
            finished = self.jobs.wait_all_finished(bound) => {
                if !finished {
                    warn!("not all jobs finished within bound, continuing shutdown anyway");
                }
                true
            }
            _ = self.stop_notify.notified() => false,
        }
    }

    /// Poll [`BusySignal::is_busy`] until it clears or `bound` elapses.
    /// Returns `false` if cancelled.
    async fn wait_busy_cleared(&self, bound: Option<Duration>) -> bool {
        let deadline = bound.map(|d| Instant::now() + d);
        loop {
            if !self.busy.is_busy().await {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("backlog did not finish resending within budget, continuing shutdown anyway");
                    return true;
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(BUSY_POLL_INTERVAL) => {}
                _ = self.stop_notify.notified() => return false,
            }
        }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
