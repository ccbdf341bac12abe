// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn startup_creates_state_dir_and_writes_pid() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path().join("state"));

    let state = startup(paths.clone()).unwrap();
    let pid_text = std::fs::read_to_string(&paths.lock_path).unwrap();
    assert_eq!(pid_text.trim(), std::process::id().to_string());

    state.shutdown();
    assert!(!paths.lock_path.exists());
}

#[test]
fn second_startup_against_the_same_state_dir_fails_to_lock() {
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path().join("state"));

    let first = startup(paths.clone()).unwrap();
    let err = startup(paths.clone()).unwrap_err();
    assert!(matches!(err, AgentError::LockFailed(_)));

    // The failed second attempt must not have torn down the first's lock file.
    assert!(paths.lock_path.exists());
    drop(first);
}
