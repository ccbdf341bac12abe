// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::field::CronField;

fn wildcard_field(min: u32, max: u32) -> CronField {
    CronField::parse("*", "minute", min, max, 1).expect("parse")
}

fn sample_entry(raw_text: &str) -> ScheduleEntry {
    ScheduleEntry {
        minute: wildcard_field(0, 59),
        hour: wildcard_field(0, 23),
        dom: wildcard_field(1, 31),
        month: wildcard_field(1, 12),
        dow: wildcard_field(0, 7),
        kind: EntryKind::Plugin,
        plugin_class: Some("Backup".to_string()),
        command: String::new(),
        backward_tolerance_minutes: None,
        max_runtime_minutes: None,
        min_runtime_minutes: None,
        raw_text: raw_text.to_string(),
    }
}

#[test]
fn empty_schedule_has_no_entries_and_is_valid() {
    let schedule = Schedule::empty(42);
    assert!(schedule.entries.is_empty());
    assert!(schedule.is_valid());
    assert_eq!(schedule.creation_time_ms, 42);
}

#[test]
fn schedule_with_errors_is_not_valid() {
    let mut schedule = Schedule::empty(0);
    schedule.errors.push(ScheduleParseError::MissingPluginClass { line: 1 });
    assert!(!schedule.is_valid());
}

#[test]
fn render_joins_raw_text_with_newlines() {
    let mut schedule = Schedule::empty(0);
    schedule.entries.push(sample_entry("* * * * * PLUGIN Backup"));
    schedule.entries.push(sample_entry("* * * * * PLUGIN Other"));
    assert_eq!(
        schedule.render(),
        "* * * * * PLUGIN Backup\n* * * * * PLUGIN Other"
    );
}
