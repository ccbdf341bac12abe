// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluate a schedule against a point in time: which entries are due,
//! and at exactly which minute.
//!
//! Every one of the five fields (minute, hour, dom, month, dow) must
//! match a candidate minute for an entry to fire there — DOM and DOW
//! intersect rather than union, matching the pinned design decision for
//! this schedule format (most cron implementations union the two; this
//! one does not).

use crate::entry::{Schedule, ScheduleEntry};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Search this far forward before giving up on finding a match. A
/// schedule whose fields can never all align (e.g. `dom=31` crossed
/// with `month=2`) would otherwise search forever.
const FORWARD_SEARCH_LIMIT_MINUTES: i64 = 4 * 365 * 24 * 60;

/// One entry that is due to fire, and exactly when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    pub entry_index: usize,
    pub fire_time_ms: i64,
}

/// For every entry in `schedule`, find the earliest matching minute at
/// or before `now_ms` and report it as a firing.
///
/// When `look_backward` is set, an entry with `backward_tolerance_minutes`
/// widens its search window to start that many minutes before `now_ms`
/// instead of starting at `now_ms` itself — this is how a missed firing
/// (daemon was down, schedule just reloaded) still gets caught. Entries
/// without a configured tolerance are unaffected by `look_backward`.
///
/// The returned firings are sorted earliest-first, so a caller picking
/// one winner among entries bound to the same resource can break ties by
/// taking the first.
pub fn get_next_schedules(schedule: &Schedule, now_ms: i64, look_backward: bool) -> Vec<Firing> {
    let mut firings = Vec::new();

    for (entry_index, entry) in schedule.entries.iter().enumerate() {
        let search_start_ms = if look_backward {
            match entry.backward_tolerance_minutes {
                Some(tolerance) => now_ms - i64::from(tolerance) * 60_000,
                None => now_ms,
            }
        } else {
            now_ms
        };
        let search_start_ms = search_start_ms.max(schedule.creation_time_ms);

        if let Some(fire_time_ms) = next_match(entry, search_start_ms) {
            if fire_time_ms <= now_ms {
                firings.push(Firing {
                    entry_index,
                    fire_time_ms,
                });
            }
        }
    }

    firings.sort_by_key(|f| f.fire_time_ms);
    firings
}

/// Earliest minute at or after `start_ms` (rounded up to the next whole
/// minute) at which every field of `entry` matches, searching no further
/// than `FORWARD_SEARCH_LIMIT_MINUTES` ahead.
fn next_match(entry: &ScheduleEntry, start_ms: i64) -> Option<i64> {
    let mut candidate = round_up_to_minute(start_ms)?;

    for _ in 0..FORWARD_SEARCH_LIMIT_MINUTES {
        if entry_matches(entry, &candidate) {
            return Some(candidate.timestamp_millis());
        }
        candidate = candidate.checked_add_signed(Duration::minutes(1))?;
    }

    None
}

fn entry_matches(entry: &ScheduleEntry, at: &DateTime<Utc>) -> bool {
    let cron_dow = at.weekday().num_days_from_sunday();
    let dow_matches = entry.dow.matches(cron_dow) || (cron_dow == 0 && entry.dow.matches(7));

    entry.minute.matches(at.minute())
        && entry.hour.matches(at.hour())
        && entry.dom.matches(at.day())
        && entry.month.matches(at.month())
        && dow_matches
}

/// Earliest instant, strictly after `after_ms`, at which any entry in
/// `schedule` is due. Does not consider `backward_tolerance_minutes` —
/// this looks only forward, for sizing a sleep or deciding whether the
/// next job is "far enough out" to justify a duty-cycle shutdown.
pub fn next_fire_after(schedule: &Schedule, after_ms: i64) -> Option<i64> {
    schedule
        .entries
        .iter()
        .filter_map(|e| next_match(e, after_ms + 1))
        .min()
}

fn round_up_to_minute(ms: i64) -> Option<DateTime<Utc>> {
    let secs = ms.div_euclid(1000);
    let at = DateTime::from_timestamp(secs, 0)?;
    if ms.rem_euclid(1000) == 0 && at.second() == 0 {
        Some(at)
    } else {
        let truncated = at.with_second(0)?.with_nanosecond(0)?;
        truncated.checked_add_signed(Duration::minutes(1))
    }
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
