// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-file-first startup: acquire the exclusive lock before touching
//! anything else, so two agent processes never run against the same
//! state directory at once.

use crate::error::AgentError;
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub schedule_path: PathBuf,
}

impl Paths {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("agent.pid"),
            schedule_path: state_dir.join("schedule"),
            state_dir,
        }
    }
}

/// Held for the lifetime of the process; the exclusive lock releases
/// when this (and the `File` it wraps) drops.
pub struct AgentState {
    pub paths: Paths,
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the state directory and its lock file. On any failure other
/// than the lock already being held, clean up whatever this attempt
/// created — a `LockFailed` means those files belong to the already
/// running agent, not to us.
pub fn startup(paths: Paths) -> Result<AgentState, AgentError> {
    match startup_inner(&paths) {
        Ok(state) => Ok(state),
        Err(e) => {
            if !matches!(e, AgentError::LockFailed(_)) {
                cleanup_on_failure(&paths);
            }
            Err(e)
        }
    }
}

fn startup_inner(paths: &Paths) -> Result<AgentState, AgentError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file.try_lock_exclusive().map_err(AgentError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    info!(state_dir = %paths.state_dir.display(), "agent started");
    Ok(AgentState {
        paths: paths.clone(),
        lock_file,
    })
}

fn cleanup_on_failure(paths: &Paths) {
    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }
}

impl AgentState {
    /// Remove the PID file; the lock itself is released by `Drop`.
    pub fn shutdown(&self) {
        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                tracing::warn!(error = %e, "failed to remove PID file on shutdown");
            }
        }
        info!("agent shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
