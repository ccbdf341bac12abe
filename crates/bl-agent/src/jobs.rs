// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-observe subprocess tracking (spec §4.F/§4.E): one blocking
//! wait task per spawned child, reaped as soon as it exits. No job
//! control beyond that — a job that outlives its `max_runtime_minutes`
//! is neither killed nor rescheduled (spec §1 Non-goals).

use async_trait::async_trait;
use bl_engine::JobsObserver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Child;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

struct Inner {
    jobs: Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
    all_finished: Notify,
    overall_max_runtime_seconds: AtomicU32,
}

/// Tracks every subprocess handed to it via [`JobsObserver::observe_job`]
/// until it exits.
#[derive(Clone)]
pub struct ProcessJobsObserver {
    inner: Arc<Inner>,
}

impl ProcessJobsObserver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                all_finished: Notify::new(),
                overall_max_runtime_seconds: AtomicU32::new(0),
            }),
        }
    }

    /// Update the padding budget reported by `overall_max_runtime_seconds`,
    /// recomputed by the caller whenever the active schedule changes.
    pub fn set_overall_max_runtime_seconds(&self, seconds: u32) {
        self.inner.overall_max_runtime_seconds.store(seconds, Ordering::SeqCst);
    }
}

impl Default for ProcessJobsObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobsObserver for ProcessJobsObserver {
    fn observe_job(&self, mut child: Child, command: String, _max_runtime_minutes: Option<u32>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.jobs.lock().insert(id, command.clone());

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = child.wait();
            let mut jobs = inner.jobs.lock();
            jobs.remove(&id);
            let empty = jobs.is_empty();
            drop(jobs);

            match outcome {
                Ok(status) => debug!(%command, %status, "job exited"),
                Err(e) => warn!(%command, error = %e, "failed to wait on job"),
            }
            if empty {
                inner.all_finished.notify_waiters();
            }
        });
    }

    async fn all_jobs_finished(&self) -> bool {
        self.inner.jobs.lock().is_empty()
    }

    async fn wait_all_finished(&self, timeout: Option<Duration>) -> bool {
        loop {
            if self.inner.jobs.lock().is_empty() {
                return true;
            }
            match timeout {
                Some(bound) => {
                    if tokio::time::timeout(bound, self.inner.all_finished.notified()).await.is_err() {
                        return self.inner.jobs.lock().is_empty();
                    }
                }
                None => self.inner.all_finished.notified().await,
            }
        }
    }

    fn overall_max_runtime_seconds(&self) -> u32 {
        self.inner.overall_max_runtime_seconds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
