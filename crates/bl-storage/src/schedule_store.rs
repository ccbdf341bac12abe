// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two files per schedule: `<schedule_file>` (raw text, human-readable
//! and authoritative) and `<schedule_file>.parsed` (a bincode-encoded
//! sidecar of the already-validated entries, read back at startup so the
//! agent doesn't have to re-parse and re-sanity-check the raw text on
//! every restart).
//!
//! Both writes go through write-to-tmp, `sync_all`, then
//! `fs::rename`-into-place, so a crash mid-write never leaves the raw
//! file and the sidecar out of sync with each other.

use crate::error::StoreError;
use bl_cron::{Schedule, ScheduleEntry};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// The pre-parsed sidecar. Only ever built from an already-validated
/// `Schedule` (one with no `errors`) — row-level parse errors are never
/// persisted, since a schedule carrying any is rejected by the caller
/// before it reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedScheduleSidecar {
    pub entries: Vec<ScheduleEntry>,
    pub creation_time_ms: i64,
}

impl From<&Schedule> for ParsedScheduleSidecar {
    fn from(schedule: &Schedule) -> Self {
        Self {
            entries: schedule.entries.clone(),
            creation_time_ms: schedule.creation_time_ms,
        }
    }
}

impl ParsedScheduleSidecar {
    fn into_schedule(self) -> Schedule {
        Schedule {
            entries: self.entries,
            creation_time_ms: self.creation_time_ms,
            errors: Vec::new(),
        }
    }
}

/// Persists the last-known schedule under `schedule_path`, with the
/// pre-parsed sidecar living alongside it at `schedule_path.parsed`.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    raw_path: PathBuf,
    parsed_path: PathBuf,
}

impl ScheduleStore {
    pub fn new(schedule_path: impl Into<PathBuf>) -> Self {
        let raw_path = schedule_path.into();
        let parsed_path = append_extension(&raw_path, "parsed");
        Self {
            raw_path,
            parsed_path,
        }
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    /// Persist `schedule`: raw text first, then the pre-parsed sidecar.
    /// Both files are written tmp-then-renamed so a crash between the
    /// two writes leaves at worst a stale (not corrupt) sidecar, which
    /// `load` detects and discards.
    pub fn save(&self, schedule: &Schedule) -> Result<(), StoreError> {
        write_atomic(&self.raw_path, schedule.render().as_bytes())?;

        let sidecar = ParsedScheduleSidecar::from(schedule);
        let encoded = bincode::serialize(&sidecar)?;
        write_atomic(&self.parsed_path, &encoded)?;

        Ok(())
    }

    /// Load the pre-parsed sidecar if present and not stale relative to
    /// the raw file's `creation_time_ms`. Returns `Ok(None)` if there is
    /// no prior schedule, or if the sidecar is missing, corrupt, or
    /// stale — in all of those cases the agent starts with no schedule
    /// rather than falling back to re-parsing the raw text, matching the
    /// "pre-parsed or nothing" startup rule.
    pub fn load(&self) -> Result<Option<Schedule>, StoreError> {
        if !self.parsed_path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.parsed_path)?;
        let reader = BufReader::new(file);
        match bincode::deserialize_from::<_, ParsedScheduleSidecar>(reader) {
            Ok(sidecar) => Ok(Some(sidecar.into_schedule())),
            Err(e) => {
                let bak_path = rotate_bak_path(&self.parsed_path);
                warn!(
                    error = %e,
                    path = %self.parsed_path.display(),
                    bak = %bak_path.display(),
                    "corrupt schedule sidecar, moving to .bak and starting with no schedule",
                );
                fs::rename(&self.parsed_path, &bak_path)?;
                Ok(None)
            }
        }
    }

    /// Raw text of the last-saved schedule, if any — used to echo the
    /// active schedule back to GSN on request without needing the
    /// in-memory `Schedule` still around.
    pub fn load_raw_text(&self) -> Result<Option<String>, StoreError> {
        if !self.raw_path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.raw_path)?))
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = append_extension(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(contents)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

const MAX_BAK_FILES: u32 = 3;

fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            append_extension(path, "bak")
        } else {
            append_extension(path, &format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "schedule_store_tests.rs"]
mod tests;
