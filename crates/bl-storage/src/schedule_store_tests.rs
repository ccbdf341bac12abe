// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bl_cron::parse;
use std::fs;
use tempfile::tempdir;

#[test]
fn save_then_load_round_trips_entries() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("schedule.txt"));

    let schedule = parse("0 3 * * * PLUGIN Backup", 1_000);
    assert!(schedule.is_valid());
    store.save(&schedule).unwrap();

    let loaded = store.load().unwrap().expect("schedule persisted");
    assert_eq!(loaded.entries.len(), 1);
    assert_eq!(loaded.creation_time_ms, 1_000);
    assert!(loaded.is_valid());
}

#[yare::parameterized(
    single_plugin = { "0 3 * * * PLUGIN Backup" },
    script_with_args = { "*/15 * * * * SCRIPT /opt/bin/check.sh --verbose" },
    multiple_rows = { "0 3 * * * PLUGIN Backup\n0 4 * * * PLUGIN Other" },
)]
fn round_trip_preserves_raw_text(text: &str) {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("schedule.txt"));

    let schedule = parse(text, 1_000);
    assert!(schedule.is_valid());
    store.save(&schedule).unwrap();

    let raw = store.load_raw_text().unwrap().expect("raw text present");
    assert_eq!(raw, text);
}

#[test]
fn load_with_no_prior_save_returns_none() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("schedule.txt"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn save_writes_raw_text_readable_independently() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("schedule.txt"));

    let schedule = parse("0 3 * * * PLUGIN Backup", 1_000);
    store.save(&schedule).unwrap();

    let raw = store.load_raw_text().unwrap().expect("raw text present");
    assert_eq!(raw, "0 3 * * * PLUGIN Backup");
}

#[test]
fn corrupt_sidecar_is_rotated_to_bak_and_load_returns_none() {
    let dir = tempdir().unwrap();
    let raw_path = dir.path().join("schedule.txt");
    let store = ScheduleStore::new(&raw_path);

    let schedule = parse("0 3 * * * PLUGIN Backup", 1_000);
    store.save(&schedule).unwrap();

    let parsed_path = dir.path().join("schedule.txt.parsed");
    fs::write(&parsed_path, b"not a valid bincode sidecar").unwrap();

    let loaded = store.load().unwrap();
    assert!(loaded.is_none());
    assert!(dir.path().join("schedule.txt.parsed.bak").exists());
    assert!(!parsed_path.exists());
}

#[test]
fn no_tmp_file_left_behind_after_save() {
    let dir = tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("schedule.txt"));

    let schedule = parse("0 3 * * * PLUGIN Backup", 1_000);
    store.save(&schedule).unwrap();

    assert!(!dir.path().join("schedule.txt.tmp").exists());
    assert!(!dir.path().join("schedule.txt.parsed.tmp").exists());
}
