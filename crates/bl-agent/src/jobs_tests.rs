// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn all_jobs_finished_is_true_with_no_observed_jobs() {
    let observer = ProcessJobsObserver::new();
    assert!(observer.all_jobs_finished().await);
    assert!(observer.wait_all_finished(Some(Duration::from_millis(10))).await);
}

#[tokio::test]
async fn observed_job_is_reaped_after_it_exits() {
    let observer = ProcessJobsObserver::new();
    let child = std::process::Command::new("true").spawn().unwrap();
    observer.observe_job(child, "true".to_string(), None);

    let finished = observer.wait_all_finished(Some(Duration::from_secs(5))).await;
    assert!(finished);
    assert!(observer.all_jobs_finished().await);
}

#[tokio::test]
async fn overall_max_runtime_seconds_reflects_last_set_value() {
    let observer = ProcessJobsObserver::new();
    assert_eq!(observer.overall_max_runtime_seconds(), 0);
    observer.set_overall_max_runtime_seconds(120);
    assert_eq!(observer.overall_max_runtime_seconds(), 120);
}
