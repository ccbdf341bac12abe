// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ports::JobsObserver;
use async_trait::async_trait;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

struct FakeJobs;

#[async_trait]
impl JobsObserver for FakeJobs {
    fn observe_job(&self, _child: Child, _command: String, _max_runtime_minutes: Option<u32>) {}

    async fn all_jobs_finished(&self) -> bool {
        true
    }

    async fn wait_all_finished(&self, _timeout: Option<Duration>) -> bool {
        true
    }

    fn overall_max_runtime_seconds(&self) -> u32 {
        0
    }
}

struct FakeBusy {
    busy: AtomicBool,
}

#[async_trait]
impl BusySignal for FakeBusy {
    async fn is_busy(&self) -> bool {
        self.busy.load(AtomicOrdering::SeqCst)
    }
}

struct FakeTos {
    beacon: AtomicBool,
    stopped: AtomicBool,
    shutdown_sent: AtomicBool,
}

impl FakeTos {
    fn new(beacon: bool) -> Self {
        Self {
            beacon: AtomicBool::new(beacon),
            stopped: AtomicBool::new(false),
            shutdown_sent: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TosControl for FakeTos {
    async fn service_window(&self, _seconds: Option<u32>) -> bool {
        true
    }

    async fn wakeup_query(&self) -> bool {
        true
    }

    fn is_beacon_active(&self) -> bool {
        self.beacon.load(AtomicOrdering::SeqCst)
    }

    async fn shutdown(&self, _seconds_offset: u32) -> bool {
        self.shutdown_sent.store(true, AtomicOrdering::SeqCst);
        true
    }

    fn stop_ping(&self) {
        self.stopped.store(true, AtomicOrdering::SeqCst);
    }
}

fn idle_request() -> ShutdownRequest {
    ShutdownRequest {
        service_window_delay: None,
        max_job_runtime: None,
        resend_budget: Duration::from_secs(1),
        next_service_window_seconds: Some(3600),
        hard_shutdown_offset_seconds: 120,
    }
}

#[tokio::test(start_paused = true)]
async fn completes_and_signals_exit_when_nothing_blocks() {
    let (exit_tx, exit_rx) = oneshot::channel();
    let tos = Arc::new(FakeTos::new(false));
    let orchestrator = ShutdownOrchestrator::new(
        Arc::new(FakeJobs),
        Arc::new(FakeBusy {
            busy: AtomicBool::new(false),
        }),
        tos.clone(),
        exit_tx,
    );

    let outcome = orchestrator.run(idle_request(), || false).await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert!(tos.shutdown_sent.load(AtomicOrdering::SeqCst));
    assert!(tos.stopped.load(AtomicOrdering::SeqCst));
    exit_rx.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn aborts_when_beacon_is_active_at_stage_seven() {
    let (exit_tx, _exit_rx) = oneshot::channel();
    let tos = Arc::new(FakeTos::new(true));
    let orchestrator = ShutdownOrchestrator::new(
        Arc::new(FakeJobs),
        Arc::new(FakeBusy {
            busy: AtomicBool::new(false),
        }),
        tos.clone(),
        exit_tx,
    );

    let outcome = orchestrator.run(idle_request(), || false).await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::AbortedBeacon);
    assert!(!tos.shutdown_sent.load(AtomicOrdering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn aborts_when_schedule_is_imminent_at_stage_five() {
    let (exit_tx, _exit_rx) = oneshot::channel();
    let tos = Arc::new(FakeTos::new(false));
    let orchestrator = ShutdownOrchestrator::new(
        Arc::new(FakeJobs),
        Arc::new(FakeBusy {
            busy: AtomicBool::new(false),
        }),
        tos,
        exit_tx,
    );

    let outcome = orchestrator.run(idle_request(), || true).await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::AbortedScheduleImminent);
}

#[tokio::test]
async fn stop_cancels_a_busy_backlog_wait() {
    let (exit_tx, _exit_rx) = oneshot::channel();
    let orchestrator = Arc::new(ShutdownOrchestrator::new(
        Arc::new(FakeJobs),
        Arc::new(FakeBusy {
            busy: AtomicBool::new(true),
        }),
        Arc::new(FakeTos::new(false)),
        exit_tx,
    ));

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move { runner.run(idle_request(), || false).await.unwrap() });

    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.stop();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Cancelled);
}

#[tokio::test]
async fn stop_cancels_job_drain_wait() {
    struct NeverFinishes;

    #[async_trait]
    impl JobsObserver for NeverFinishes {
        fn observe_job(&self, _child: Child, _command: String, _max_runtime_minutes: Option<u32>) {}

        async fn all_jobs_finished(&self) -> bool {
            false
        }

        async fn wait_all_finished(&self, _timeout: Option<Duration>) -> bool {
            std::future::pending().await
        }

        fn overall_max_runtime_seconds(&self) -> u32 {
            0
        }
    }

    let (exit_tx, _exit_rx) = oneshot::channel();
    let orchestrator = Arc::new(ShutdownOrchestrator::new(
        Arc::new(NeverFinishes),
        Arc::new(FakeBusy {
            busy: AtomicBool::new(false),
        }),
        Arc::new(FakeTos::new(false)),
        exit_tx,
    ));

    let runner = orchestrator.clone();
    let handle = tokio::spawn(async move { runner.run(idle_request(), || false).await.unwrap() });

    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.stop();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Cancelled);
}
